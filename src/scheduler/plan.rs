//! Per-event schedule planning
//!
//! The planner is the synchronous core of the pipeline: exclusion, bucket
//! partitioning and delay sampling composed into one pure-ish function
//! (pure given an rng). It produces an ephemeral [`SchedulePlan`] that the
//! dispatcher turns into deferred tasks; nothing here is persisted.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::models::WorkerIdentity;

use super::policy::{sample_offset, DistributionPolicy, Window};
use super::pool::{select_active, ExclusionRange};

// ============================================================================
// Schedule Plan
// ============================================================================

/// Workers assigned to one bucket, in their (already shuffled) order
#[derive(Debug, Clone)]
pub struct BucketAssignment {
    /// Bucket name
    pub name: String,

    /// Bucket window
    pub window: Window,

    /// Assigned workers
    pub workers: Vec<WorkerIdentity>,
}

/// One planned firing: a worker and its jittered fire-time
#[derive(Debug, Clone)]
pub struct PlannedFire {
    /// The worker that will act
    pub worker: WorkerIdentity,

    /// Name of the bucket the delay was sampled from
    pub bucket: String,

    /// Sampled offset from the planning instant, in seconds
    pub offset_secs: u64,

    /// Absolute fire-time
    pub fire_at: DateTime<Utc>,
}

/// Ephemeral per-event plan: exclusion outcome, bucket assignment and
/// computed fire-times. Lives only for the duration of planning.
#[derive(Debug, Clone)]
pub struct SchedulePlan {
    /// Planning instant all offsets are relative to
    pub planned_at: DateTime<Utc>,

    /// Workers excluded from this event
    pub excluded: Vec<WorkerIdentity>,

    /// Bucket name -> ordered workers
    pub buckets: Vec<BucketAssignment>,

    /// One entry per active worker
    pub fires: Vec<PlannedFire>,
}

impl SchedulePlan {
    /// Number of deferred tasks this plan will produce
    pub fn task_count(&self) -> usize {
        self.fires.len()
    }

    /// Whether the plan schedules nothing (valid for degenerate inputs)
    pub fn is_empty(&self) -> bool {
        self.fires.is_empty()
    }

    /// Format a human-readable summary of the plan
    pub fn summary(&self) -> String {
        let mut output = format!(
            "Plan at {} | active: {} | excluded: {}\n",
            self.planned_at.format("%Y-%m-%d %H:%M:%S"),
            self.fires.len(),
            self.excluded.len()
        );
        output.push_str(&format!("{:-<60}\n", ""));

        for bucket in &self.buckets {
            output.push_str(&format!(
                "{:>8} [{:>6}s..{:>6}s) {:>4} workers\n",
                bucket.name,
                bucket.window.start,
                bucket.window.end,
                bucket.workers.len()
            ));
        }

        if let (Some(first), Some(last)) = (
            self.fires.iter().map(|f| f.offset_secs).min(),
            self.fires.iter().map(|f| f.offset_secs).max(),
        ) {
            output.push_str(&format!("First fire: +{first}s, last fire: +{last}s\n"));
        }

        output
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Composes exclusion, bucketing and sampling into per-event plans
#[derive(Debug, Clone)]
pub struct Planner {
    exclusion: ExclusionRange,
    policy: DistributionPolicy,
}

impl Planner {
    /// Create a planner from an exclusion range and a distribution policy
    pub fn new(exclusion: ExclusionRange, policy: DistributionPolicy) -> Self {
        Self { exclusion, policy }
    }

    /// The configured distribution policy
    pub fn policy(&self) -> &DistributionPolicy {
        &self.policy
    }

    /// Build a plan for one event.
    ///
    /// `candidates` is the owning group's membership; the rng is injected so
    /// callers can use entropy in production and a seeded `ChaCha8Rng` for
    /// reproducible previews and tests. Zero candidates yield a valid empty
    /// plan.
    pub fn plan(
        &self,
        candidates: &[WorkerIdentity],
        planned_at: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> SchedulePlan {
        let selection = select_active(candidates, &self.exclusion, rng);
        let planned_buckets = self.policy.bucket_counts(selection.active.len(), rng);

        let mut buckets = Vec::with_capacity(planned_buckets.len());
        let mut fires = Vec::with_capacity(selection.active.len());
        let mut remaining = selection.active.as_slice();

        // Workers were shuffled during selection, so consuming them in
        // order gives each one a uniformly random bucket placement.
        for planned in planned_buckets {
            let (assigned, rest) = remaining.split_at(planned.count.min(remaining.len()));
            remaining = rest;

            for worker in assigned {
                let offset_secs = sample_offset(planned.window, rng);
                fires.push(PlannedFire {
                    worker: worker.clone(),
                    bucket: planned.name.clone(),
                    offset_secs,
                    fire_at: planned_at + Duration::seconds(offset_secs as i64),
                });
            }

            buckets.push(BucketAssignment {
                name: planned.name,
                window: planned.window,
                workers: assigned.to_vec(),
            });
        }

        SchedulePlan {
            planned_at,
            excluded: selection.excluded,
            buckets,
            fires,
        }
    }
}
