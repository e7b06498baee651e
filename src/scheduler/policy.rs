//! Distribution policy and delay sampling
//!
//! A policy answers one question: given the active worker count, how many
//! workers land in each time bucket, and what window does each bucket span?
//! Two historical policies exist and both are expressed as configuration
//! data rather than separate code paths:
//!
//! - [`DistributionPolicy::Buckets`] - four weighted contiguous windows
//!   across a 24-hour horizon (quiet / ramp / peak / tail). The default.
//! - [`DistributionPolicy::Mixture`] - a leading batch split 70/30 between
//!   an early and a late tier, with the remainder spread across a long
//!   rest window.
//!
//! Delay sampling draws uniformly inside a bucket's window, with the
//! effective minimum clamped to one second so a task is never already due
//! at enqueue time.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

/// Seconds in one hour
const HOUR: u64 = 3600;

// ============================================================================
// Window
// ============================================================================

/// Half-open time window `[start, end)` in seconds since the planning instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Window start (inclusive), seconds
    pub start: u64,

    /// Window end (exclusive), seconds
    pub end: u64,
}

impl Window {
    /// Create a window
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Window length in seconds (zero for degenerate windows)
    pub fn len_secs(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Draw a jittered offset uniformly from `[window.start, window.end)`.
///
/// Degenerate windows collapse to their start. The result is clamped to a
/// minimum of one second so the computed fire-time always lies strictly
/// after the planning instant.
pub fn sample_offset(window: Window, rng: &mut impl Rng) -> u64 {
    let raw = if window.end > window.start {
        rng.gen_range(window.start..window.end)
    } else {
        window.start
    };
    raw.max(1)
}

// ============================================================================
// Bucket Table Policy
// ============================================================================

/// One named bucket in a bucket-table policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Bucket name (e.g. "quiet", "ramp", "peak", "tail")
    pub name: String,

    /// Time window for the bucket
    pub window: Window,

    /// Share of active workers in [0, 1].
    ///
    /// The last bucket's share is informational only: it receives whatever
    /// remains after the earlier buckets take `floor(total * share)` each.
    pub share: f64,
}

impl BucketSpec {
    /// Create a bucket spec
    pub fn new(name: impl Into<String>, start: u64, end: u64, share: f64) -> Self {
        Self {
            name: name.into(),
            window: Window::new(start, end),
            share,
        }
    }
}

/// Default 24-hour four-bucket table: a short peak spike shortly after the
/// quiet phase ends, with a long tail absorbing stragglers.
pub fn default_buckets() -> Vec<BucketSpec> {
    vec![
        BucketSpec::new("quiet", 0, 8 * HOUR, 0.15),
        BucketSpec::new("ramp", 8 * HOUR, 8 * HOUR + 6000, 0.20),
        BucketSpec::new("peak", 8 * HOUR + 6000, 10 * HOUR, 0.45),
        BucketSpec::new("tail", 10 * HOUR, 24 * HOUR, 0.20),
    ]
}

// ============================================================================
// Mixture Policy
// ============================================================================

/// Two-tier mixture policy confined to a short planning horizon.
///
/// A `first_share` fraction of the active set forms the leading batch; each
/// of its members independently lands in the early tier with probability
/// `early_weight`, otherwise in the late tier. Everyone else draws from the
/// rest window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureSpec {
    /// Fraction of active workers in the leading batch
    pub first_share: f64,

    /// Probability a leading-batch worker lands in the early tier
    pub early_weight: f64,

    /// Early tier window
    pub early_window: Window,

    /// Late tier window
    pub late_window: Window,

    /// Window for workers outside the leading batch
    pub rest_window: Window,
}

impl Default for MixtureSpec {
    fn default() -> Self {
        // The earliest design iteration: 25% leading batch, 70% of it
        // inside the first hour, 30% in hours 1-3, the rest in hours 3-24.
        Self {
            first_share: 0.25,
            early_weight: 0.70,
            early_window: Window::new(0, HOUR),
            late_window: Window::new(HOUR, 3 * HOUR),
            rest_window: Window::new(3 * HOUR, 24 * HOUR),
        }
    }
}

// ============================================================================
// Distribution Policy
// ============================================================================

/// A planned bucket: a window plus the number of workers assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBucket {
    /// Bucket name
    pub name: String,

    /// Time window workers in this bucket sample from
    pub window: Window,

    /// Number of active workers assigned
    pub count: usize,
}

/// Pluggable distribution policy, selected via configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionPolicy {
    /// Weighted bucket table (the newer four-bucket 24-hour design)
    Buckets {
        /// Ordered bucket table; the final bucket absorbs rounding remainders
        buckets: Vec<BucketSpec>,
    },

    /// Two-tier leading-batch mixture (the earliest design iteration)
    Mixture {
        /// Mixture parameters
        mixture: MixtureSpec,
    },
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self::Buckets {
            buckets: default_buckets(),
        }
    }
}

impl DistributionPolicy {
    /// The default mixture policy
    pub fn default_mixture() -> Self {
        Self::Mixture {
            mixture: MixtureSpec::default(),
        }
    }

    /// Validate windows and shares
    pub fn validate(&self) -> SchedulerResult<()> {
        match self {
            Self::Buckets { buckets } => {
                if buckets.is_empty() {
                    return Err(SchedulerError::invalid_shares("bucket table is empty"));
                }
                let mut head_total = 0.0;
                for (i, bucket) in buckets.iter().enumerate() {
                    if bucket.window.end < bucket.window.start {
                        return Err(SchedulerError::invalid_window(
                            &bucket.name,
                            bucket.window.start,
                            bucket.window.end,
                        ));
                    }
                    if !(0.0..=1.0).contains(&bucket.share) {
                        return Err(SchedulerError::invalid_shares(format!(
                            "bucket '{}' share {} outside [0, 1]",
                            bucket.name, bucket.share
                        )));
                    }
                    if i + 1 < buckets.len() {
                        head_total += bucket.share;
                    }
                }
                if head_total > 1.0 {
                    return Err(SchedulerError::invalid_shares(format!(
                        "leading bucket shares sum to {head_total}, exceeding 1"
                    )));
                }
                Ok(())
            }
            Self::Mixture { mixture } => {
                if !(0.0..=1.0).contains(&mixture.first_share) {
                    return Err(SchedulerError::invalid_shares(format!(
                        "first_share {} outside [0, 1]",
                        mixture.first_share
                    )));
                }
                if !(0.0..=1.0).contains(&mixture.early_weight) {
                    return Err(SchedulerError::invalid_shares(format!(
                        "early_weight {} outside [0, 1]",
                        mixture.early_weight
                    )));
                }
                for (name, window) in [
                    ("early", mixture.early_window),
                    ("late", mixture.late_window),
                    ("rest", mixture.rest_window),
                ] {
                    if window.end < window.start {
                        return Err(SchedulerError::invalid_window(
                            name,
                            window.start,
                            window.end,
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Partition `active` workers into planned buckets.
    ///
    /// Counts are non-negative and sum exactly to `active`; rounding
    /// remainders land in the final bucket. An empty active set yields
    /// buckets with zero counts (a valid empty plan).
    pub fn bucket_counts(&self, active: usize, rng: &mut impl Rng) -> Vec<PlannedBucket> {
        match self {
            Self::Buckets { buckets } => {
                let mut planned = Vec::with_capacity(buckets.len());
                let mut assigned = 0usize;

                for (i, bucket) in buckets.iter().enumerate() {
                    let count = if i + 1 == buckets.len() {
                        active - assigned
                    } else {
                        let c = ((active as f64) * bucket.share).floor() as usize;
                        // Guard against share tables that overrun the pool
                        c.min(active - assigned)
                    };
                    assigned += count;
                    planned.push(PlannedBucket {
                        name: bucket.name.clone(),
                        window: bucket.window,
                        count,
                    });
                }
                planned
            }
            Self::Mixture { mixture } => {
                let first = ((active as f64) * mixture.first_share).floor() as usize;
                let early = (0..first)
                    .filter(|_| rng.gen::<f64>() < mixture.early_weight)
                    .count();
                let late = first - early;
                let rest = active - first;

                vec![
                    PlannedBucket {
                        name: "early".to_string(),
                        window: mixture.early_window,
                        count: early,
                    },
                    PlannedBucket {
                        name: "late".to_string(),
                        window: mixture.late_window,
                        count: late,
                    },
                    PlannedBucket {
                        name: "rest".to_string(),
                        window: mixture.rest_window,
                        count: rest,
                    },
                ]
            }
        }
    }
}
