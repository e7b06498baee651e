//! Unified error handling for the esinti crate
//!
//! Domain-specific errors live next to their modules; this module wraps
//! them into a single [`Error`] enum for use across module boundaries.

use std::io;
use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;

/// Result type alias using the unified error
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the esinti crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduler and planning errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
        }
    }
}
