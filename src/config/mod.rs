use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Secrets may also come from the environment (OPENAI_API_KEY,
    /// ANTHROPIC_API_KEY); values in the file take precedence
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolSettings {
    /// Seconds between reconciliation passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Upper bound on simultaneously active connections
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_agents: usize,
    /// Grace period for a graceful connection stop
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_seconds: u64,
    /// Bound on draining all connections at process shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewaySettings {
    /// Which gateway client to connect with ("loopback" is the only
    /// built-in driver)
    #[serde(default = "default_gateway_driver")]
    pub driver: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Outbound replies longer than this are split into chunks
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemorySettings {
    /// Pool-wide cap on turns kept per conversation scope
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// API keys for LLM providers, from the config file or the environment
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct SecretsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
}

impl SecretsConfig {
    pub fn openai_api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn anthropic_api_key(&self) -> Option<String> {
        self.anthropic_api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    50
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    1_000
}

fn default_backoff_cap() -> u64 {
    60_000
}

fn default_gateway_driver() -> String {
    "loopback".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_message_length() -> usize {
    2_000
}

fn default_max_history() -> usize {
    20
}

fn default_database_url() -> String {
    "sqlite://hydra.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            max_concurrent_agents: default_max_concurrent(),
            stop_timeout_seconds: default_stop_timeout(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_cap_ms: default_backoff_cap(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            driver: default_gateway_driver(),
            connect_timeout_seconds: default_connect_timeout(),
            max_message_length: default_max_message_length(),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_file("hydra.toml")
    }

    /// Create settings from CLI arguments (config file plus CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::from_file(&cli.config.to_string_lossy())?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);
        settings.validate()?;

        Ok(settings)
    }

    fn from_file(path: &str) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        Ok(settings)
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.database_url {
            self.database.url = url.clone();
        }
        if let Some(interval) = cli.poll_interval {
            self.pool.poll_interval_seconds = interval;
        }
        if let Some(max_agents) = cli.max_agents {
            self.pool.max_concurrent_agents = max_agents;
        }
        if let Some(driver) = &cli.gateway_driver {
            self.gateway.driver = driver.clone();
        }
    }

    /// Reject values that would stall or break the reconciliation loop
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.pool.poll_interval_seconds == 0 {
            anyhow::bail!("pool.poll_interval_seconds must be greater than zero");
        }
        if self.pool.max_concurrent_agents == 0 {
            anyhow::bail!("pool.max_concurrent_agents must be greater than zero");
        }
        if self.pool.backoff_base_ms == 0 {
            anyhow::bail!("pool.backoff_base_ms must be greater than zero");
        }
        if self.pool.backoff_cap_ms < self.pool.backoff_base_ms {
            anyhow::bail!("pool.backoff_cap_ms must be at least pool.backoff_base_ms");
        }
        if self.gateway.max_message_length == 0 {
            anyhow::bail!("gateway.max_message_length must be greater than zero");
        }
        if self.gateway.driver != "loopback" {
            anyhow::bail!("unknown gateway driver '{}'", self.gateway.driver);
        }
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        Ok(())
    }
}
