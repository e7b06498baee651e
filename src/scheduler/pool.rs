//! Worker pool, group resolution and random exclusion
//!
//! The pool holds every configured worker identity plus the group metadata
//! that gates which workers may act on which subjects. Selection for a
//! given event shuffles the group's members and drops a random prefix,
//! simulating non-universal participation.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Group, WorkerIdentity};

use super::error::{SchedulerError, SchedulerResult};

// ============================================================================
// Exclusion Range
// ============================================================================

/// Fraction range for random per-event worker exclusion.
///
/// The excluded count `k` is drawn uniformly (inclusive) from
/// `[floor(min * N), floor(max * N)]` where N is the candidate count, and is
/// recomputed independently for every event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExclusionRange {
    /// Minimum excluded fraction (e.g. 0.05)
    pub min: f64,

    /// Maximum excluded fraction (e.g. 0.10)
    pub max: f64,
}

impl Default for ExclusionRange {
    fn default() -> Self {
        Self {
            min: 0.05,
            max: 0.10,
        }
    }
}

impl ExclusionRange {
    /// Create a validated exclusion range
    pub fn new(min: f64, max: f64) -> SchedulerResult<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Validate that both fractions lie in [0, 1] with min <= max
    pub fn validate(&self) -> SchedulerResult<()> {
        let in_bounds = (0.0..=1.0).contains(&self.min) && (0.0..=1.0).contains(&self.max);
        if !in_bounds || self.min > self.max {
            return Err(SchedulerError::invalid_exclusion(self.min, self.max));
        }
        Ok(())
    }

    /// Inclusive bounds on the excluded count for a candidate pool of size n
    pub fn count_bounds(&self, n: usize) -> (usize, usize) {
        let lo = (self.min * n as f64).floor() as usize;
        let hi = (self.max * n as f64).floor() as usize;
        (lo, hi)
    }

    /// Draw an excluded count for a candidate pool of size n.
    ///
    /// When the range collapses to a single value the draw is that value;
    /// small pools get no special-casing.
    pub fn draw(&self, n: usize, rng: &mut impl Rng) -> usize {
        let (lo, hi) = self.count_bounds(n);
        if lo >= hi {
            lo
        } else {
            rng.gen_range(lo..=hi)
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Outcome of per-event worker selection
#[derive(Debug, Clone)]
pub struct Selection {
    /// Workers that will act, in shuffled order
    pub active: Vec<WorkerIdentity>,

    /// Workers sitting this event out
    pub excluded: Vec<WorkerIdentity>,
}

/// Shuffle candidates and drop a randomly drawn prefix.
///
/// The shuffle breaks any positional correlation from listing order; the
/// surviving `active` set keeps the shuffled order, which downstream bucket
/// assignment relies on for randomized per-worker placement.
pub fn select_active(
    candidates: &[WorkerIdentity],
    exclusion: &ExclusionRange,
    rng: &mut impl Rng,
) -> Selection {
    let mut shuffled = candidates.to_vec();
    shuffled.shuffle(rng);

    let k = exclusion.draw(shuffled.len(), rng);
    let active = shuffled.split_off(k);

    Selection {
        active,
        excluded: shuffled,
    }
}

// ============================================================================
// Worker Pool
// ============================================================================

/// Registry of worker identities and the groups that gate their eligibility
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    workers: HashMap<String, WorkerIdentity>,
    groups: Vec<Group>,
}

impl WorkerPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from workers and groups, verifying group membership.
    ///
    /// Every worker name referenced by a group must be registered.
    pub fn build(workers: Vec<WorkerIdentity>, groups: Vec<Group>) -> SchedulerResult<Self> {
        let mut pool = Self::new();
        for worker in workers {
            pool.add_worker(worker);
        }
        for group in groups {
            pool.add_group(group)?;
        }
        Ok(pool)
    }

    /// Register a worker (replaces any existing identity with the same name)
    pub fn add_worker(&mut self, worker: WorkerIdentity) {
        self.workers.insert(worker.name.clone(), worker);
    }

    /// Register a group after checking its members exist
    pub fn add_group(&mut self, group: Group) -> SchedulerResult<()> {
        for name in &group.workers {
            if !self.workers.contains_key(name) {
                return Err(SchedulerError::UnknownWorker {
                    group: group.name.clone(),
                    worker: name.clone(),
                });
            }
        }
        self.groups.push(group);
        Ok(())
    }

    /// Total registered workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// All configured groups
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Look up a worker by name
    pub fn worker(&self, name: &str) -> Option<&WorkerIdentity> {
        self.workers.get(name)
    }

    /// Resolve the group that owns a subject (zero or one).
    ///
    /// A subject not belonging to any configured group yields no scheduling.
    pub fn resolve_subject(&self, subject: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.owns_subject(subject))
    }

    /// Candidate workers for a group, in configured member order
    pub fn members_of(&self, group: &Group) -> Vec<WorkerIdentity> {
        group
            .workers
            .iter()
            .filter_map(|name| self.workers.get(name).cloned())
            .collect()
    }
}
