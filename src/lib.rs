//! esinti - Human-paced fan-out scheduler
//!
//! Schedules a pool of worker identities to perform a delayed,
//! time-distributed action against freshly observed events, so the
//! aggregate timing pattern looks organic rather than an instantaneous
//! burst.
//!
//! # Architecture
//!
//! The library is organized into a few modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures (workers, groups, events)
//! - [`scheduler`] - Dedup, exclusion, bucketing, sampling and dispatch
//! - [`error`] - Unified error type
//!
//! The messaging-platform client is an external collaborator; the core
//! only ever sees it through the [`scheduler::Action`] trait.
//!
//! # Example
//!
//! ```no_run
//! use esinti::config::Config;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(Path::new("esinti.toml"))?;
//!     // build a WorkerPool and Dispatcher from the config...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::{Event, Group, Notification, WorkerIdentity};
    pub use crate::scheduler::{
        Action, Dispatcher, Disposition, DistributionPolicy, EventLedger, ExclusionRange,
        Planner, SettleDelay, WorkerPool,
    };
}

// Direct re-exports for convenience
pub use models::{Event, Group, Notification, WorkerIdentity};
