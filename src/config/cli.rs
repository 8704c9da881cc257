use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ea-store")]
#[command(about = "EA license storefront, back-office API and license verification server")]
pub struct ServeArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ea-store.toml")]
    pub config: String,

    /// Override the listen port from config
    #[arg(long)]
    pub port: Option<u16>,

    /// Use the in-memory store instead of the hosted database
    #[arg(long)]
    pub memory: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}
