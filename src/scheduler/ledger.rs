//! Dedup ledger
//!
//! Process-wide set of event identifiers already accepted for scheduling.
//! Multiple listener paths can observe the same event (once per worker that
//! also watches the source); whichever path calls [`EventLedger::admit`]
//! first wins and every later call for the same identity is refused.
//!
//! Entries are evicted once they age past the configured retention horizon,
//! so the ledger stays bounded over long uptimes. Duplicate delivery of an
//! event beyond that horizon is not a realistic concern.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Default retention horizon for admitted event identities (48 hours)
pub const DEFAULT_RETENTION_HOURS: i64 = 48;

/// Interior state, guarded by a single mutex so admit is atomic
/// check-and-set across concurrent listener paths.
#[derive(Debug, Default)]
struct LedgerState {
    /// Admitted identities for O(1) membership checks
    admitted: HashSet<String>,

    /// Admission order with timestamps, oldest at the front
    order: VecDeque<(String, DateTime<Utc>)>,
}

/// Set of already-admitted event identifiers with time-window eviction.
///
/// Explicitly constructed and injected (no module-level singleton), so
/// independent scheduler instances can coexist in tests.
#[derive(Debug)]
pub struct EventLedger {
    state: Mutex<LedgerState>,
    retention: Duration,
}

impl EventLedger {
    /// Create a ledger with the default 48-hour retention
    pub fn new() -> Self {
        Self::with_retention(Duration::hours(DEFAULT_RETENTION_HOURS))
    }

    /// Create a ledger with a custom retention horizon
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            retention,
        }
    }

    /// Admit an event identity.
    ///
    /// Returns `true` and records the identity on first call; returns
    /// `false` on every subsequent call for the same identity within the
    /// retention horizon. Safe under concurrent invocation.
    pub fn admit(&self, event_id: &str) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        Self::evict_older_than(&mut state, now - self.retention);

        if state.admitted.contains(event_id) {
            return false;
        }

        state.admitted.insert(event_id.to_string());
        state.order.push_back((event_id.to_string(), now));
        true
    }

    /// Check membership without admitting.
    ///
    /// Entries past the retention horizon are evicted first, so an aged-out
    /// identity reads as absent even if nothing was admitted since.
    pub fn contains(&self, event_id: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::evict_older_than(&mut state, Utc::now() - self.retention);
        state.admitted.contains(event_id)
    }

    /// Number of identities currently retained, after eviction
    pub fn len(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::evict_older_than(&mut state, Utc::now() - self.retention);
        state.admitted.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Internal: drop entries admitted before the cutoff
    fn evict_older_than(state: &mut LedgerState, cutoff: DateTime<Utc>) {
        while let Some((id, at)) = state.order.front() {
            if *at >= cutoff {
                break;
            }
            state.admitted.remove(id);
            state.order.pop_front();
        }
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}
