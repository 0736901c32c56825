//! # Hydra - Agent Pool Supervisor
//!
//! Hydra supervises a pool of chat-bot agent connections against a chat
//! gateway. A persisted table of agent configurations is the desired
//! state; a reconciliation loop diffs it against the live connections
//! and starts, stops, or restarts them to converge.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hydra::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let settings = Settings::new()?;
//!
//!     // The reconciler will poll the configured database
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Persistence**: the desired-state table of agent configs
//! - **Pool**: the reconciler and one supervisor task per connection
//! - **Agents**: response generation (echo, LLM) and conversation memory
//! - **Gateway**: the chat transport abstraction

pub mod agents;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod persistence;
pub mod pool;
pub mod utils;
