//! Shared helpers

mod splitter;

pub use splitter::split_message;
