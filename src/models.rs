// Core data structures for the esinti scheduler

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A worker identity capable of performing the deferred action.
///
/// Identity is unique by name. The session label is opaque to the core;
/// the external action collaborator uses it to locate the worker's
/// credential/session material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    /// Unique worker name
    pub name: String,

    /// Opaque session reference for the external collaborator
    pub session: String,
}

impl WorkerIdentity {
    /// Create a worker whose session label equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            session: name.clone(),
            name,
        }
    }

    /// Create a worker with an explicit session label
    pub fn with_session(name: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session: session.into(),
        }
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named collection of workers plus the subjects it is allowed to act on.
///
/// Groups may overlap: a worker can belong to more than one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,

    /// Member worker names
    pub workers: Vec<String>,

    /// Subjects (channels/feeds) this group acts on
    pub subjects: HashSet<String>,
}

impl Group {
    /// Create an empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
            subjects: HashSet::new(),
        }
    }

    /// Add a member worker name
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        let worker = worker.into();
        if !self.workers.contains(&worker) {
            self.workers.push(worker);
        }
        self
    }

    /// Add a subject this group acts on
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subjects.insert(subject.into());
        self
    }

    /// Check whether this group owns a subject
    pub fn owns_subject(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }
}

/// A single actionable occurrence: a new item appeared on a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Subject (channel/feed) the item appeared on
    pub subject: String,

    /// Item identifier within the subject
    pub item_id: String,
}

impl Event {
    /// Create a new event
    pub fn new(subject: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            item_id: item_id.into(),
        }
    }

    /// Dedup identity: `{subject}:{item_id}`
    ///
    /// Globally unique within process lifetime.
    pub fn id(&self) -> String {
        format!("{}:{}", self.subject, self.item_id)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject, self.item_id)
    }
}

/// Raw notification as delivered by the event source.
///
/// Notifications without a viewable metric carry nothing countable yet and
/// are ignored by the dispatcher without touching the dedup ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Subject the item appeared on
    pub subject: String,

    /// Item identifier
    pub item_id: String,

    /// Whether a countable metric exists for the item
    pub has_viewable_metric: bool,
}

impl Notification {
    /// Create a notification with a viewable metric present
    pub fn viewable(subject: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            item_id: item_id.into(),
            has_viewable_metric: true,
        }
    }

    /// Convert into the event it describes
    pub fn into_event(self) -> Event {
        Event {
            subject: self.subject,
            item_id: self.item_id,
        }
    }
}
