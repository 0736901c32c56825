//! Agent domain types

mod message;

pub use message::{Conversation, Role, Turn};
