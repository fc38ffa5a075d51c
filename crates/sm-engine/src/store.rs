//! # Storage Collaborators
//!
//! The coordinator talks to two stores through traits:
//!
//! - [`SnapshotStore`]: keyed case snapshots with a version counter. `put`
//!   is a compare-and-swap on that version.
//! - [`NotificationStore`]: durable notices. The engine only ever saves.
//!
//! In-memory implementations back the tests and the CLI dry runs. They use
//! `parking_lot::RwLock`, which is non-poisoning, and never hold the lock
//! across a call into user code.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use sm_core::{CaseId, NoticeId, Timestamp, UserId};
use sm_notify::NotificationEvent;
use sm_state::CaseSnapshot;
use thiserror::Error;

/// Version of a freshly inserted case.
pub const INITIAL_VERSION: u64 = 1;

/// Failure reported by a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stored version moved since it was read.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The key is not present.
    #[error("record {0} not found")]
    NotFound(String),

    /// The store refused the write (validation, policy).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A snapshot together with the version it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub snapshot: CaseSnapshot,
    pub version: u64,
}

// ─── Traits ──────────────────────────────────────────────────────────

/// Keyed snapshot storage with optimistic concurrency.
pub trait SnapshotStore: Send + Sync {
    /// Load the current snapshot of a case.
    fn get(&self, case_id: &CaseId) -> Result<Option<Versioned>, StoreError>;

    /// Store the first snapshot of a case, returning [`INITIAL_VERSION`].
    ///
    /// Fails with [`StoreError::Conflict`] if the case already exists.
    fn insert(&self, snapshot: CaseSnapshot) -> Result<u64, StoreError>;

    /// Replace a snapshot if its stored version equals `expected_version`,
    /// returning the new version.
    fn put(
        &self,
        case_id: &CaseId,
        snapshot: CaseSnapshot,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}

/// Durable notice storage.
pub trait NotificationStore: Send + Sync {
    /// Persist one notice. The event carries its notice id.
    fn save(&self, event: &NotificationEvent) -> Result<(), StoreError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn get(&self, case_id: &CaseId) -> Result<Option<Versioned>, StoreError> {
        (**self).get(case_id)
    }

    fn insert(&self, snapshot: CaseSnapshot) -> Result<u64, StoreError> {
        (**self).insert(snapshot)
    }

    fn put(
        &self,
        case_id: &CaseId,
        snapshot: CaseSnapshot,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        (**self).put(case_id, snapshot, expected_version)
    }
}

impl<T: NotificationStore + ?Sized> NotificationStore for Arc<T> {
    fn save(&self, event: &NotificationEvent) -> Result<(), StoreError> {
        (**self).save(event)
    }
}

// ─── In-Memory Snapshot Store ────────────────────────────────────────

/// Thread-safe, cloneable in-memory snapshot store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    data: Arc<RwLock<HashMap<CaseId, Versioned>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cases.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn get(&self, case_id: &CaseId) -> Result<Option<Versioned>, StoreError> {
        Ok(self.data.read().get(case_id).cloned())
    }

    fn insert(&self, snapshot: CaseSnapshot) -> Result<u64, StoreError> {
        let mut guard = self.data.write();
        if let Some(existing) = guard.get(&snapshot.case_id) {
            return Err(StoreError::Conflict {
                expected: 0,
                actual: existing.version,
            });
        }
        guard.insert(
            snapshot.case_id.clone(),
            Versioned {
                snapshot,
                version: INITIAL_VERSION,
            },
        );
        Ok(INITIAL_VERSION)
    }

    fn put(
        &self,
        case_id: &CaseId,
        snapshot: CaseSnapshot,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut guard = self.data.write();
        let entry = guard
            .get_mut(case_id)
            .ok_or_else(|| StoreError::NotFound(case_id.to_string()))?;
        if entry.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: entry.version,
            });
        }
        entry.version += 1;
        entry.snapshot = snapshot;
        Ok(entry.version)
    }
}

// ─── In-Memory Notification Store ────────────────────────────────────

/// A saved notice and its read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredNotice {
    #[serde(flatten)]
    pub event: NotificationEvent,
    pub read_at: Option<Timestamp>,
}

impl StoredNotice {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Thread-safe in-memory notice inbox.
///
/// Besides `save`, offers the reader-side operations of a notice service:
/// per-user listing (newest first), marking read, and unread counts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationStore {
    data: Arc<RwLock<HashMap<NoticeId, StoredNotice>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice addressed to `user`, newest first.
    pub fn list_for_user(&self, user: &UserId) -> Vec<StoredNotice> {
        let mut notices: Vec<StoredNotice> = self
            .data
            .read()
            .values()
            .filter(|n| &n.event.recipient == user)
            .cloned()
            .collect();
        notices.sort_by(|a, b| {
            b.event
                .created_at
                .cmp(&a.event.created_at)
                .then_with(|| b.event.notice_id.cmp(&a.event.notice_id))
        });
        notices
    }

    /// Look up one notice.
    pub fn get(&self, notice_id: &NoticeId) -> Option<StoredNotice> {
        self.data.read().get(notice_id).cloned()
    }

    /// Mark one notice read. Re-marking keeps the first read time.
    pub fn mark_read(&self, notice_id: &NoticeId, at: Timestamp) -> Result<(), StoreError> {
        let mut guard = self.data.write();
        let notice = guard
            .get_mut(notice_id)
            .ok_or_else(|| StoreError::NotFound(notice_id.to_string()))?;
        notice.read_at.get_or_insert(at);
        Ok(())
    }

    /// Mark every unread notice of `user` read, returning how many changed.
    pub fn mark_all_read(&self, user: &UserId, at: Timestamp) -> usize {
        let mut guard = self.data.write();
        let mut changed = 0;
        for notice in guard.values_mut() {
            if &notice.event.recipient == user && notice.read_at.is_none() {
                notice.read_at = Some(at);
                changed += 1;
            }
        }
        changed
    }

    /// Number of unread notices addressed to `user`.
    pub fn unread_count(&self, user: &UserId) -> usize {
        self.data
            .read()
            .values()
            .filter(|n| &n.event.recipient == user && !n.is_read())
            .count()
    }

    /// Total number of stored notices.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn save(&self, event: &NotificationEvent) -> Result<(), StoreError> {
        let notice_id = event
            .notice_id
            .clone()
            .ok_or_else(|| StoreError::Rejected("notice has no id".to_string()))?;
        let mut guard = self.data.write();
        if guard.contains_key(&notice_id) {
            return Err(StoreError::Rejected(format!("duplicate notice id {notice_id}")));
        }
        guard.insert(
            notice_id,
            StoredNotice {
                event: event.clone(),
                read_at: None,
            },
        );
        Ok(())
    }
}
