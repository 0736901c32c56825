//! Persistence layer: the desired-state table of agent configurations
//!
//! The reconciler treats this layer as a read-only source of truth.
//! Writes happen through operator tooling; the pool only lists.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::PersistenceError;
pub use models::AgentRow;
pub use pool::{ConnectionPool, DatabaseBackend};
pub use repository::{AgentRepository, SqlAgentRepository};
