//! Event dispatch and deferred execution
//!
//! The dispatcher accepts notifications from the event source and runs the
//! full pipeline: metric gate, dedup ledger, group resolution, planning,
//! then one spawned tokio task per selected worker. Each task sleeps until
//! its fire-time, pauses for a short per-action settle jitter and invokes
//! the external [`Action`]. Tasks are fully independent: one worker's
//! failure never cancels or delays a sibling.
//!
//! Observability follows the distributor pattern used elsewhere in this
//! codebase's lineage: a broadcast channel of [`TaskEvent`]s plus a
//! [`DispatchStats`] snapshot behind an async lock. A `watch`-based
//! shutdown signal refuses new events and lets pending tasks abandon
//! cleanly instead of firing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use crate::models::{Event, Notification, WorkerIdentity};

use super::error::{SchedulerError, SchedulerResult};
use super::ledger::EventLedger;
use super::plan::{Planner, PlannedFire, SchedulePlan};
use super::pool::WorkerPool;

// ============================================================================
// Action Boundary
// ============================================================================

/// The external side-effecting action, performed once per (worker, event).
///
/// The core does not inspect what the action does internally (join,
/// acknowledge, increment, ...), only whether it ultimately succeeds.
#[async_trait]
pub trait Action: Send + Sync {
    /// Perform the action as `worker` against `event`
    async fn perform(&self, worker: &WorkerIdentity, event: &Event) -> anyhow::Result<()>;
}

// ============================================================================
// Settle Delay
// ============================================================================

/// Extra per-action delay applied after fire-time, before the action runs.
///
/// Models the short "settle" pause a real client takes between waking up
/// and acting. Applied outside the bucket window so fire-times keep their
/// window invariant exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettleDelay {
    /// Minimum extra delay in seconds
    pub min_secs: u64,

    /// Maximum extra delay in seconds (inclusive)
    pub max_secs: u64,
}

impl Default for SettleDelay {
    fn default() -> Self {
        Self {
            min_secs: 2,
            max_secs: 5,
        }
    }
}

impl SettleDelay {
    /// No extra delay
    pub fn none() -> Self {
        Self {
            min_secs: 0,
            max_secs: 0,
        }
    }

    /// Draw a settle delay in seconds
    pub fn draw(&self, rng: &mut impl Rng) -> u64 {
        if self.min_secs >= self.max_secs {
            self.min_secs
        } else {
            rng.gen_range(self.min_secs..=self.max_secs)
        }
    }
}

// ============================================================================
// Task Events
// ============================================================================

/// Why a notification produced no schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No countable metric exists for the item yet
    NoViewableMetric,
    /// Event identity was already admitted
    Duplicate,
    /// Subject belongs to no configured group
    UnresolvedSubject,
}

/// Events broadcast as tasks move through their lifecycle
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// An event was admitted and planned
    EventAdmitted {
        event: Event,
        tasks: usize,
        excluded: usize,
    },

    /// A notification was dropped without scheduling
    EventSkipped { event: Event, reason: SkipReason },

    /// A deferred task reached its fire-time
    TaskFired { worker: WorkerIdentity, event: Event },

    /// The action succeeded for one worker
    TaskSucceeded { worker: WorkerIdentity, event: Event },

    /// The action failed for one worker (terminal, isolated)
    TaskFailed {
        worker: WorkerIdentity,
        event: Event,
        error: String,
    },

    /// A pending task was abandoned by shutdown
    TaskAbandoned { worker: WorkerIdentity, event: Event },
}

/// Outcome of offering a notification to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Event admitted; this many deferred tasks were created
    Scheduled { tasks: usize },

    /// Notification dropped (not an error)
    Skipped(SkipReason),
}

// ============================================================================
// Stats
// ============================================================================

/// Counters for dispatcher activity
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// Events admitted and planned
    pub events_admitted: u64,

    /// Notifications dropped for lacking a viewable metric
    pub skipped_no_metric: u64,

    /// Notifications dropped as duplicates
    pub skipped_duplicate: u64,

    /// Notifications dropped for an unresolved subject
    pub skipped_unresolved: u64,

    /// Deferred tasks created
    pub tasks_scheduled: u64,

    /// Tasks whose action succeeded
    pub tasks_succeeded: u64,

    /// Tasks whose action failed
    pub tasks_failed: u64,

    /// Tasks abandoned by shutdown
    pub tasks_abandoned: u64,

    /// Timestamp of the last admitted event
    pub last_admitted: Option<DateTime<Utc>>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Schedules deferred worker actions for freshly observed events
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    planner: Planner,
    ledger: EventLedger,
    settle: SettleDelay,
    action: Arc<dyn Action>,
    event_tx: broadcast::Sender<TaskEvent>,
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<RwLock<DispatchStats>>,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// The ledger is injected so tests (and multiple independent dispatcher
    /// instances) control its lifecycle explicitly.
    pub fn new(
        pool: WorkerPool,
        planner: Planner,
        ledger: EventLedger,
        settle: SettleDelay,
        action: Arc<dyn Action>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            pool: Arc::new(pool),
            planner,
            ledger,
            settle,
            action,
            event_tx,
            shutdown_tx,
            stats: Arc::new(RwLock::new(DispatchStats::default())),
        }
    }

    /// Subscribe to task lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// The worker pool backing this dispatcher
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The dedup ledger (exposed for observability)
    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Snapshot of dispatcher counters
    pub async fn stats(&self) -> DispatchStats {
        self.stats.read().await.clone()
    }

    /// Whether shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop admitting new events and abandon pending deferred tasks.
    ///
    /// In-flight actions (already past fire-time) run to completion.
    pub fn shutdown(&self) {
        info!("Dispatcher shutdown requested; pending tasks will be abandoned");
        // send_replace updates the value even when no task is subscribed
        self.shutdown_tx.send_replace(true);
    }

    /// Offer a notification for scheduling.
    ///
    /// Runs metric gate -> dedup -> group resolution -> planning, then
    /// spawns one deferred task per selected worker. Never blocks waiting
    /// for any task to fire. Duplicate and unresolvable notifications are
    /// valid no-ops, reported in the returned [`Disposition`].
    pub async fn schedule(&self, notification: Notification) -> SchedulerResult<Disposition> {
        let event = Event::new(&notification.subject, &notification.item_id);

        if self.is_shut_down() {
            return Err(SchedulerError::ShuttingDown {
                event_id: event.id(),
            });
        }

        // No countable metric yet: ignore without touching the ledger.
        if !notification.has_viewable_metric {
            debug!(event = %event, "Skipping notification without viewable metric");
            return Ok(self
                .skip(event, SkipReason::NoViewableMetric)
                .await);
        }

        // Dedup gate. Whichever listener path gets here first wins; the
        // event is consumed even if its subject turns out to be unowned.
        if !self.ledger.admit(&event.id()) {
            debug!(event = %event, "Skipping duplicate event");
            return Ok(self.skip(event, SkipReason::Duplicate).await);
        }

        let Some(group) = self.pool.resolve_subject(&event.subject) else {
            debug!(subject = %event.subject, "Subject belongs to no configured group");
            return Ok(self.skip(event, SkipReason::UnresolvedSubject).await);
        };

        let candidates = self.pool.members_of(group);
        let plan = self
            .planner
            .plan(&candidates, Utc::now(), &mut rand::thread_rng());

        self.launch(&event, &plan);

        info!(
            event = %event,
            group = %group.name,
            tasks = plan.task_count(),
            excluded = plan.excluded.len(),
            "Event admitted and scheduled"
        );

        let tasks = plan.task_count();
        let mut stats = self.stats.write().await;
        stats.events_admitted += 1;
        stats.tasks_scheduled += tasks as u64;
        stats.last_admitted = Some(Utc::now());
        drop(stats);

        let _ = self.event_tx.send(TaskEvent::EventAdmitted {
            event,
            tasks,
            excluded: plan.excluded.len(),
        });

        Ok(Disposition::Scheduled { tasks })
    }

    // Internal: record and report a skipped notification
    async fn skip(&self, event: Event, reason: SkipReason) -> Disposition {
        let mut stats = self.stats.write().await;
        match reason {
            SkipReason::NoViewableMetric => stats.skipped_no_metric += 1,
            SkipReason::Duplicate => stats.skipped_duplicate += 1,
            SkipReason::UnresolvedSubject => stats.skipped_unresolved += 1,
        }
        drop(stats);

        let _ = self.event_tx.send(TaskEvent::EventSkipped { event, reason });
        Disposition::Skipped(reason)
    }

    // Internal: spawn one deferred task per planned fire
    fn launch(&self, event: &Event, plan: &SchedulePlan) {
        for fire in &plan.fires {
            self.spawn_deferred(event.clone(), fire.clone());
        }
    }

    fn spawn_deferred(&self, event: Event, fire: PlannedFire) {
        let action = Arc::clone(&self.action);
        let stats = Arc::clone(&self.stats);
        let event_tx = self.event_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let settle = self.settle;

        tokio::spawn(async move {
            // A shutdown issued between the subscribe above and this point
            // would be marked as already seen; catch it up front.
            if *shutdown_rx.borrow() {
                stats.write().await.tasks_abandoned += 1;
                let _ = event_tx.send(TaskEvent::TaskAbandoned {
                    worker: fire.worker,
                    event,
                });
                return;
            }

            let wait = wait_until(fire.fire_at, Utc::now());

            debug!(
                worker = %fire.worker,
                event = %event,
                bucket = %fire.bucket,
                offset_secs = fire.offset_secs,
                "Deferred task pending"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.changed() => {
                    debug!(worker = %fire.worker, event = %event, "Pending task abandoned by shutdown");
                    stats.write().await.tasks_abandoned += 1;
                    let _ = event_tx.send(TaskEvent::TaskAbandoned {
                        worker: fire.worker,
                        event,
                    });
                    return;
                }
            }

            // Firing: a short settle pause, then the external action.
            let _ = event_tx.send(TaskEvent::TaskFired {
                worker: fire.worker.clone(),
                event: event.clone(),
            });

            let pause = settle.draw(&mut rand::thread_rng());
            if pause > 0 {
                tokio::time::sleep(std::time::Duration::from_secs(pause)).await;
            }

            match action.perform(&fire.worker, &event).await {
                Ok(()) => {
                    info!(worker = %fire.worker, event = %event, "Action succeeded");
                    stats.write().await.tasks_succeeded += 1;
                    let _ = event_tx.send(TaskEvent::TaskSucceeded {
                        worker: fire.worker,
                        event,
                    });
                }
                Err(err) => {
                    warn!(worker = %fire.worker, event = %event, error = %err, "Action failed");
                    stats.write().await.tasks_failed += 1;
                    let _ = event_tx.send(TaskEvent::TaskFailed {
                        worker: fire.worker,
                        event,
                        error: err.to_string(),
                    });
                }
            }
        });
    }
}

/// Remaining wait before `fire_at`; a fire-time already in the past is due
/// now, not a second from now.
fn wait_until(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (fire_at - now).to_std().unwrap_or(std::time::Duration::ZERO)
}
