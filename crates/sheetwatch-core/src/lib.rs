//! Core change-detection and notification engine for sheetwatch.
//!
//! This crate is intentionally framework-agnostic. Google Sheets and Telegram
//! live behind ports (traits) implemented in adapter crates.

pub mod backoff;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod monitor;
pub mod security;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
