//! Shared helpers for THZ services
//!
//! - logging bootstrap (console + optional daily file)
//! - hex formatting for frame dumps

pub mod hex;
pub mod logging;

pub use logging::LogConfig;
