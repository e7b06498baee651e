//! Integration tests for the esinti scheduling pipeline
//!
//! These tests verify the complete workflow: dedup gating, random
//! exclusion, bucket partitioning, delay sampling and independent
//! deferred execution through the dispatcher.

use async_trait::async_trait;
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use esinti::models::{Event, Group, Notification, WorkerIdentity};
use esinti::scheduler::{
    Action, BucketSpec, Dispatcher, Disposition, DistributionPolicy, EventLedger,
    ExclusionRange, Planner, SettleDelay, SkipReason, WorkerPool,
};

// ============================================================================
// Helpers
// ============================================================================

fn workers(n: usize) -> Vec<WorkerIdentity> {
    (0..n).map(|i| WorkerIdentity::new(format!("w{i}"))).collect()
}

fn pool_with_group(n: usize, subject: &str) -> WorkerPool {
    let identities = workers(n);
    let mut group = Group::new("g").with_subject(subject);
    for w in &identities {
        group = group.with_worker(&w.name);
    }
    WorkerPool::build(identities, vec![group]).unwrap()
}

/// Counts performed actions; optionally fails for one worker
struct CountingAction {
    performed: AtomicUsize,
    failed: AtomicUsize,
    fail_worker: Option<String>,
}

impl CountingAction {
    fn new() -> Self {
        Self {
            performed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            fail_worker: None,
        }
    }

    fn failing_for(worker: &str) -> Self {
        Self {
            fail_worker: Some(worker.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl Action for CountingAction {
    async fn perform(&self, worker: &WorkerIdentity, _event: &Event) -> anyhow::Result<()> {
        self.performed.fetch_add(1, Ordering::SeqCst);
        if self.fail_worker.as_deref() == Some(worker.name.as_str()) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("simulated failure");
        }
        Ok(())
    }
}

/// Policy with a short horizon so paused-clock tests drain quickly
fn fast_policy() -> DistributionPolicy {
    DistributionPolicy::Buckets {
        buckets: vec![
            BucketSpec::new("early", 0, 5, 0.5),
            BucketSpec::new("late", 5, 10, 0.5),
        ],
    }
}

fn fast_dispatcher(pool: WorkerPool, action: Arc<CountingAction>) -> Dispatcher {
    Dispatcher::new(
        pool,
        Planner::new(ExclusionRange { min: 0.0, max: 0.0 }, fast_policy()),
        EventLedger::new(),
        SettleDelay::none(),
        action,
    )
}

async fn drain() {
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;
}

// ============================================================================
// Planning Properties
// ============================================================================

#[test]
fn test_hundred_candidate_partition() {
    // N=100, exclusion draws k in [5, 10]; with k=7, active=93 and bucket
    // counts must be (13, 18, 41, 21) summing back to 93.
    let planner = Planner::new(ExclusionRange::default(), DistributionPolicy::default());

    // Search seeds until the draw lands on k=7, then assert the partition
    let candidates = workers(100);
    let mut found = false;
    for seed in 0..200 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let plan = planner.plan(&candidates, Utc::now(), &mut rng);
        if plan.excluded.len() == 7 {
            let counts: Vec<usize> = plan.buckets.iter().map(|b| b.workers.len()).collect();
            assert_eq!(counts, vec![13, 18, 41, 21]);
            assert_eq!(plan.task_count(), 93);
            found = true;
            break;
        }
    }
    assert!(found, "no seed in 0..200 drew k=7");
}

#[test]
fn test_exclusion_bounds_across_pool_sizes() {
    let planner = Planner::new(ExclusionRange::default(), DistributionPolicy::default());
    let mut rng = ChaCha8Rng::seed_from_u64(17);

    for n in 1..=150usize {
        let plan = planner.plan(&workers(n), Utc::now(), &mut rng);
        let k = plan.excluded.len();
        let lo = (0.05 * n as f64).floor() as usize;
        let hi = (0.10 * n as f64).floor() as usize;
        assert!(k >= lo && k <= hi, "k={k} outside [{lo}, {hi}] for n={n}");
        assert_eq!(plan.task_count(), n - k);
    }
}

#[test]
fn test_fire_times_offset_from_planning_instant() {
    let planner = Planner::new(ExclusionRange::default(), DistributionPolicy::default());
    let planned_at = Utc::now();
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    let plan = planner.plan(&workers(120), planned_at, &mut rng);
    for fire in &plan.fires {
        let offset = (fire.fire_at - planned_at).num_seconds();
        assert_eq!(offset, fire.offset_secs as i64);
        assert!(offset >= 1 && offset < 86400);
    }
}

#[test]
fn test_both_policies_partition_exactly() {
    for policy in [
        DistributionPolicy::default(),
        DistributionPolicy::default_mixture(),
    ] {
        let planner = Planner::new(ExclusionRange { min: 0.0, max: 0.0 }, policy);
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let plan = planner.plan(&workers(93), Utc::now(), &mut rng);

        let total: usize = plan.buckets.iter().map(|b| b.workers.len()).sum();
        assert_eq!(total, 93);
        assert_eq!(plan.task_count(), 93);
    }
}

// ============================================================================
// Pipeline Behavior
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_schedule_produces_one_plan() {
    let action = Arc::new(CountingAction::new());
    let dispatcher = Arc::new(fast_dispatcher(
        pool_with_group(10, "chan1"),
        Arc::clone(&action),
    ));

    // Two listener paths deliver the same event concurrently
    let a = Arc::clone(&dispatcher);
    let b = Arc::clone(&dispatcher);
    let (ra, rb) = tokio::join!(
        a.schedule(Notification::viewable("chan1", "42")),
        b.schedule(Notification::viewable("chan1", "42")),
    );

    let dispositions = [ra.unwrap(), rb.unwrap()];
    let scheduled = dispositions
        .iter()
        .filter(|d| matches!(d, Disposition::Scheduled { .. }))
        .count();
    assert_eq!(scheduled, 1, "exactly one caller wins the dedup gate");

    drain().await;

    // Task count equals one plan's worth, not double
    assert_eq!(action.performed.load(Ordering::SeqCst), 10);
    let stats = dispatcher.stats().await;
    assert_eq!(stats.events_admitted, 1);
    assert_eq!(stats.skipped_duplicate, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_metric_event_is_not_consumed() {
    let action = Arc::new(CountingAction::new());
    let dispatcher = fast_dispatcher(pool_with_group(4, "chan1"), Arc::clone(&action));

    let disposition = dispatcher
        .schedule(Notification {
            subject: "chan1".to_string(),
            item_id: "42".to_string(),
            has_viewable_metric: false,
        })
        .await
        .unwrap();
    assert_eq!(disposition, Disposition::Skipped(SkipReason::NoViewableMetric));
    assert!(dispatcher.ledger().is_empty());
    drain().await;
    assert_eq!(action.performed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unowned_subject_yields_no_tasks() {
    let action = Arc::new(CountingAction::new());
    let dispatcher = fast_dispatcher(pool_with_group(4, "chan1"), Arc::clone(&action));

    let disposition = dispatcher
        .schedule(Notification::viewable("chan9", "42"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Skipped(SkipReason::UnresolvedSubject)
    );
    drain().await;
    assert_eq!(action.performed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sibling_tasks_survive_one_failure() {
    let action = Arc::new(CountingAction::failing_for("w2"));
    let dispatcher = fast_dispatcher(pool_with_group(6, "chan1"), Arc::clone(&action));

    dispatcher
        .schedule(Notification::viewable("chan1", "42"))
        .await
        .unwrap();
    drain().await;

    assert_eq!(action.performed.load(Ordering::SeqCst), 6);
    assert_eq!(action.failed.load(Ordering::SeqCst), 1);

    let stats = dispatcher.stats().await;
    assert_eq!(stats.tasks_failed, 1);
    assert_eq!(stats.tasks_succeeded, 5);
}

#[tokio::test(start_paused = true)]
async fn test_independent_events_schedule_independently() {
    let action = Arc::new(CountingAction::new());
    let identities = workers(6);
    let group_a = Group::new("a")
        .with_worker("w0")
        .with_worker("w1")
        .with_worker("w2")
        .with_subject("chan-a");
    let group_b = Group::new("b")
        .with_worker("w3")
        .with_worker("w4")
        .with_worker("w5")
        .with_subject("chan-b");
    let pool = WorkerPool::build(identities, vec![group_a, group_b]).unwrap();
    let dispatcher = fast_dispatcher(pool, Arc::clone(&action));

    let a = dispatcher
        .schedule(Notification::viewable("chan-a", "1"))
        .await
        .unwrap();
    let b = dispatcher
        .schedule(Notification::viewable("chan-b", "1"))
        .await
        .unwrap();

    assert_eq!(a, Disposition::Scheduled { tasks: 3 });
    assert_eq!(b, Disposition::Scheduled { tasks: 3 });

    drain().await;
    assert_eq!(action.performed.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_empty_group_yields_valid_empty_plan() {
    // Group owns the subject but has no members: zero tasks, not an error
    let pool = WorkerPool::build(vec![], vec![Group::new("g").with_subject("chan1")]).unwrap();
    let action = Arc::new(CountingAction::new());
    let dispatcher = fast_dispatcher(pool, Arc::clone(&action));

    let disposition = dispatcher
        .schedule(Notification::viewable("chan1", "42"))
        .await
        .unwrap();
    assert_eq!(disposition, Disposition::Scheduled { tasks: 0 });

    // The event is still consumed by the dedup gate
    assert!(dispatcher.ledger().contains("chan1:42"));
}
