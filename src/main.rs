use clap::Parser;
use ea_store::utils::error::{AppError, ErrorSeverity};
use ea_store::utils::{logger, validation::Validate};
use ea_store::{InMemoryStore, RestStore, ServeArgs, StoreBackend, StoreConfig};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServeArgs::parse();

    // 載入配置；--memory 且沒有設定檔時直接用預設值
    let mut config = if args.memory && !Path::new(&args.config).exists() {
        StoreConfig::in_memory()
    } else {
        match StoreConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    };

    // 應用命令列覆蓋設定
    if args.memory {
        config.database.backend = Some(StoreBackend::Memory);
    }
    if let Some(port) = args.port {
        config.server.port = Some(port);
    }

    logger::init_server_logger(
        args.verbose,
        config.log_level(),
        args.json_logs || config.json_logs(),
    );

    tracing::info!("🚀 Starting ea-store server");

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    let result = match config.backend() {
        StoreBackend::Memory => {
            tracing::warn!("⚠️ Using in-memory store; data is lost on shutdown");
            ea_store::server::serve(Arc::new(InMemoryStore::new()), config).await
        }
        StoreBackend::Rest => match rest_store(&config) {
            Ok(store) => ea_store::server::serve(Arc::new(store), config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Server failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn rest_store(config: &StoreConfig) -> Result<RestStore, AppError> {
    let (url, key) = config.rest_credentials()?;
    RestStore::new(url, key, config.request_timeout())
}

fn display_config_summary(config: &StoreConfig) {
    tracing::info!("📋 Configuration Summary:");
    tracing::info!("  Listen: {}", config.bind_address());
    tracing::info!("  Backend: {:?}", config.backend());
    if let Some(url) = config.database_url() {
        tracing::info!("  Database: {}", url);
    }
    tracing::info!("  CORS: {}", config.cors_enabled());
}
