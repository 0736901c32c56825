use clap::Parser;
use std::path::PathBuf;

/// Hydra - supervisor for a pool of chat agent gateway connections
#[derive(Parser, Debug, Clone)]
#[command(name = "hydra", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "HYDRA_CONFIG", default_value = "hydra.toml")]
    pub config: PathBuf,

    /// Database connection URL (sqlite:// or postgres://)
    #[arg(long, env = "HYDRA_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Seconds between reconciliation passes
    #[arg(long, env = "HYDRA_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Maximum number of simultaneously active agent connections
    #[arg(long, env = "HYDRA_MAX_AGENTS")]
    pub max_agents: Option<usize>,

    /// Gateway driver to connect with
    #[arg(long, env = "HYDRA_GATEWAY_DRIVER")]
    pub gateway_driver: Option<String>,
}
