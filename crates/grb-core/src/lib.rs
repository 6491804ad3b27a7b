//! Core domain + application logic for the group relay bot.
//!
//! This crate is framework-agnostic. Telegram and the completion provider
//! live behind ports (traits) implemented in adapter crates.

pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod history;
pub mod logging;
pub mod mention;
pub mod messaging;
pub mod relay;

pub use errors::{Error, Result};
