//! Chat-completion model: wire types, outcome classification, client port.

pub mod client;
pub mod outcome;
pub mod types;

pub use client::{build_messages, build_request, CompletionClient, SYSTEM_PROMPT};
pub use outcome::CompletionOutcome;
pub use types::*;
