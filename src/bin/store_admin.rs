use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use ea_store::core::export;
use ea_store::domain::model::{CommissionStatus, IbStatus, LicenseStatus, OrderStatus};
use ea_store::domain::services::reporting::{LicenseFilter, OrderFilter};
use ea_store::utils::error::{AppError, ErrorSeverity};
use ea_store::utils::{logger, validation::Validate};
use ea_store::{BackOffice, RestStore, StoreConfig};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "store-admin")]
#[command(about = "Back-office operations against the hosted store database (requires backend = \"rest\")")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ea-store.toml", global = true)]
    config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dashboard totals
    Stats,
    #[command(subcommand)]
    Orders(OrderCommand),
    #[command(subcommand)]
    Licenses(LicenseCommand),
    #[command(subcommand)]
    Ib(IbCommand),
    #[command(subcommand)]
    Affiliates(AffiliateCommand),
    #[command(subcommand)]
    Commissions(CommissionCommand),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<String>,
    /// Matches email, name, product or account number
    #[arg(long)]
    search: Option<String>,
    /// Write CSV to this path instead of printing JSON
    #[arg(long)]
    csv: Option<String>,
}

#[derive(Subcommand)]
enum OrderCommand {
    List(ListArgs),
    Approve { id: Uuid },
    Reject {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum LicenseCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long)]
        expiring_within_days: Option<i64>,
    },
    Extend {
        id: Uuid,
        #[arg(long)]
        months: u32,
    },
    /// Set an exact expiry (YYYY-MM-DD or RFC 3339), or --lifetime
    SetExpiry {
        id: Uuid,
        #[arg(long, conflicts_with = "lifetime", required_unless_present = "lifetime")]
        date: Option<String>,
        #[arg(long)]
        lifetime: bool,
    },
    Revoke { id: Uuid },
    /// Mark every lapsed active license as expired
    Sweep,
}

#[derive(Subcommand)]
enum IbCommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Approve { id: Uuid },
    Reject {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum AffiliateCommand {
    SetRate { profile_id: Uuid, rate: f64 },
}

#[derive(Subcommand)]
enum CommissionCommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Pay { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    let config = match StoreConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(command: Command, config: &StoreConfig) -> Result<(), AppError> {
    // 後台指令直接操作託管資料庫
    let (url, key) = config.rest_credentials()?;
    let store = Arc::new(RestStore::new(url, key, config.request_timeout())?);
    let office = BackOffice::new(store);
    let now = Utc::now();

    match command {
        Command::Stats => print_json(&office.dashboard(now).await?),

        Command::Orders(OrderCommand::List(list)) => {
            let filter = OrderFilter {
                status: parse_opt::<OrderStatus>(list.status.as_deref())?,
                search: list.search,
                ..Default::default()
            };
            let views = office.order_views(&filter).await?;
            match list.csv {
                Some(path) => write_csv(&path, &export::orders_csv(&views)?, views.len()),
                None => print_json(&views),
            }
        }
        Command::Orders(OrderCommand::Approve { id }) => {
            let approval = office.approve_order(id, now).await?;
            println!(
                "✅ Order {} approved; license {} {}",
                approval.order.id,
                approval.license.id,
                if approval.renewed { "renewed" } else { "issued" }
            );
            print_json(&approval)
        }
        Command::Orders(OrderCommand::Reject { id, note }) => {
            print_json(&office.reject_order(id, note, now).await?)
        }

        Command::Licenses(LicenseCommand::List {
            list,
            expiring_within_days,
        }) => {
            let filter = LicenseFilter {
                status: parse_opt::<LicenseStatus>(list.status.as_deref())?,
                search: list.search,
                expiring_within_days,
                ..Default::default()
            };
            let views = office.license_views(&filter, now).await?;
            match list.csv {
                Some(path) => write_csv(&path, &export::licenses_csv(&views)?, views.len()),
                None => print_json(&views),
            }
        }
        Command::Licenses(LicenseCommand::Extend { id, months }) => {
            print_json(&office.extend_license(id, months, now).await?)
        }
        Command::Licenses(LicenseCommand::SetExpiry { id, date, lifetime }) => {
            let expires_at = match (lifetime, date) {
                (true, _) | (false, None) => None,
                (false, Some(date)) => Some(parse_date(&date)?),
            };
            print_json(&office.set_license_expiry(id, expires_at, now).await?)
        }
        Command::Licenses(LicenseCommand::Revoke { id }) => {
            print_json(&office.revoke_license(id, now).await?)
        }
        Command::Licenses(LicenseCommand::Sweep) => {
            let expired = office.sweep_expired(now).await?;
            println!("🧹 {} license(s) marked expired", expired);
            Ok(())
        }

        Command::Ib(IbCommand::List { status }) => {
            let status = parse_opt::<IbStatus>(status.as_deref())?;
            print_json(&office.ib_requests(status).await?)
        }
        Command::Ib(IbCommand::Approve { id }) => {
            print_json(&office.approve_ib_request(id, now).await?)
        }
        Command::Ib(IbCommand::Reject { id, note }) => {
            print_json(&office.reject_ib_request(id, note, now).await?)
        }

        Command::Affiliates(AffiliateCommand::SetRate { profile_id, rate }) => {
            print_json(&office.set_commission_rate(profile_id, rate).await?)
        }

        Command::Commissions(CommissionCommand::List { status }) => {
            let status = parse_opt::<CommissionStatus>(status.as_deref())?;
            print_json(&office.commissions(status).await?)
        }
        Command::Commissions(CommissionCommand::Pay { id }) => {
            print_json(&office.mark_commission_paid(id, now).await?)
        }
    }
}

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| AppError::validation("status", e.to_string()))
        })
        .transpose()
}

/// 日期只給到天時以當天 UTC 23:59:59 為止
fn parse_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::validation("date", "expected YYYY-MM-DD or RFC 3339"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_csv(path: &str, content: &str, rows: usize) -> Result<(), AppError> {
    std::fs::write(path, content)?;
    tracing::info!("📁 Exported {} row(s) to {}", rows, path);
    println!("📁 Exported {} row(s) to {}", rows, path);
    Ok(())
}
