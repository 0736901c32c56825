//! Error types for the agent pool

use thiserror::Error;

/// Errors that can occur while supervising agents
#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed agent configuration; the agent is skipped, others continue
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool is at its concurrent-connection limit
    #[error("Pool at capacity: {active} active connections, limit {limit}")]
    Capacity { active: usize, limit: usize },

    /// Gateway handshake or transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// AI provider failure, recovered locally as "no reply"
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),
}

/// Errors specific to text-generation provider calls
#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-success HTTP response from the provider
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Provider rate limit hit
    #[error("Rate limited by provider")]
    RateLimited,

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request exceeded its bounded timeout
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for provider operations
pub type LlmResult<T> = Result<T, LlmError>;
