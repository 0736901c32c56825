//! Agent configuration, decision logic, and conversation memory
//!
//! - `config` - desired-state record plus variant config blobs
//! - `domain` - conversation turn and history types
//! - `memory` - bounded in-process conversation store
//! - `core` - response-agent variants (echo, llm)
//! - `llm` - text-generation provider clients

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod llm;
pub mod memory;

pub use config::{AgentConfig, AgentKind, MemoryScope};
pub use error::{AgentError, AgentResult};
