use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbose: bool, log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match (verbose, log_level) {
            (true, _) => EnvFilter::new("ea_store=debug,info"),
            (false, Some(level)) => EnvFilter::new(format!("ea_store={},warn", level)),
            (false, None) => EnvFilter::new("ea_store=info"),
        }
    })
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(filter_for(verbose, None))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 伺服器日誌；部署在容器時用 JSON 方便收集
pub fn init_server_logger(verbose: bool, log_level: Option<&str>, json: bool) {
    let registry = tracing_subscriber::registry().with(filter_for(verbose, log_level));

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .json(),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .compact(),
            )
            .init();
    }
}
