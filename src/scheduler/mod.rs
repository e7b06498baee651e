//! Human-paced event scheduling
//!
//! This module is the core of the crate: given a freshly observed event and
//! a pool of eligible workers, it deduplicates the event, excludes a random
//! fraction of workers, partitions the rest into weighted time buckets and
//! gives every worker a jittered fire-time inside its bucket, then hands
//! each firing to an external action.
//!
//! # Architecture
//!
//! ```text
//!  notification
//!       │
//!       ▼
//!  ┌──────────┐   ┌─────────────┐   ┌──────────────────────────┐
//!  │  metric  │──▶│ EventLedger │──▶│        Planner           │
//!  │   gate   │   │  (dedup)    │   │ exclusion → buckets →    │
//!  └──────────┘   └─────────────┘   │ delay sampling           │
//!                                   └───────────┬──────────────┘
//!                                               │ SchedulePlan
//!                                               ▼
//!                                   ┌──────────────────────────┐
//!                                   │       Dispatcher         │
//!                                   │ one tokio task per fire  │
//!                                   └───────────┬──────────────┘
//!                                               │ at fire-time
//!                                               ▼
//!                                        Action::perform
//! ```
//!
//! # Modules
//!
//! - [`ledger`] - dedup ledger with time-window eviction
//! - [`pool`] - worker pool, group resolution and random exclusion
//! - [`policy`] - pluggable distribution policies and delay sampling
//! - [`plan`] - per-event schedule planning
//! - [`dispatch`] - deferred execution, task events and shutdown
//!
//! # Quick Start
//!
//! ```ignore
//! use esinti::scheduler::{Dispatcher, EventLedger, Planner, SettleDelay};
//! use esinti::scheduler::{DistributionPolicy, ExclusionRange, WorkerPool};
//! use esinti::models::Notification;
//! use std::sync::Arc;
//!
//! let planner = Planner::new(ExclusionRange::default(), DistributionPolicy::default());
//! let dispatcher = Dispatcher::new(pool, planner, EventLedger::new(),
//!                                  SettleDelay::default(), Arc::new(my_action));
//!
//! // Fire-and-forget relative to the event delivery path
//! dispatcher.schedule(Notification::viewable("chan1", "42")).await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod plan;
pub mod policy;
pub mod pool;

// Re-export main types
pub use dispatch::{
    Action, DispatchStats, Dispatcher, Disposition, SettleDelay, SkipReason, TaskEvent,
};
pub use error::{SchedulerError, SchedulerResult};
pub use ledger::EventLedger;
pub use plan::{BucketAssignment, PlannedFire, Planner, SchedulePlan};
pub use policy::{
    default_buckets, sample_offset, BucketSpec, DistributionPolicy, MixtureSpec, PlannedBucket,
    Window,
};
pub use pool::{select_active, ExclusionRange, Selection, WorkerPool};
