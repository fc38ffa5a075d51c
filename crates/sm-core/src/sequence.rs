//! # ID/Sequence Generator
//!
//! Produces identifiers of the form `prefix + yyyyMMddHHmmss + NNN`, where
//! `NNN` is a zero-padded counter shared by every caller in the process.
//!
//! ## Counter
//!
//! The counter starts at zero when the process starts and is incremented
//! atomically on every call; the embedded value is `(count + 1) % 1000`, so
//! the first identifier of a process ends in `001`.
//!
//! ## Known Limitation
//!
//! Two calls in the same second collide only if more than 1000 identifiers
//! were issued in between. This is accepted and not corrected: callers that
//! need a stronger guarantee use [`SequenceGenerator::next_with_entropy`],
//! which appends a random suffix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::identity::{CaseId, NoticeId};
use crate::temporal::Timestamp;

/// Counter modulus. Identifiers carry three counter digits.
pub const SEQUENCE_MODULUS: u64 = 1000;

/// Prefix of every notice identifier.
pub const NOTICE_PREFIX: &str = "N";

static SHARED: OnceLock<Arc<SequenceGenerator>> = OnceLock::new();

/// Atomic, wrap-around identifier generator.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    counter: AtomicU64,
}

impl SequenceGenerator {
    /// A generator with its own counter, starting at zero.
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// The process-wide generator.
    pub fn shared() -> Arc<SequenceGenerator> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(SequenceGenerator::new())))
    }

    /// Next identifier stamped with the current second.
    pub fn next(&self, prefix: &str) -> String {
        self.next_at(prefix, Timestamp::now())
    }

    /// Next identifier stamped with a caller-supplied second.
    pub fn next_at(&self, prefix: &str, at: Timestamp) -> String {
        let seq = self.next_counter();
        format!("{prefix}{}{seq:03}", at.to_compact())
    }

    /// Next identifier with a six-hex-digit random suffix appended.
    pub fn next_with_entropy(&self, prefix: &str) -> String {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        let suffix = &simple[..6];
        format!("{}{suffix}", self.next(prefix))
    }

    /// Next notice identifier (`N` prefix).
    pub fn next_notice_id(&self, at: Timestamp) -> NoticeId {
        NoticeId::from_generated(self.next_at(NOTICE_PREFIX, at))
    }

    /// Next case identifier with the given case-type prefix.
    ///
    /// An empty prefix still yields a non-empty identifier.
    pub fn next_case_id(&self, prefix: &str) -> CaseId {
        CaseId::from_generated(self.next(prefix))
    }

    fn next_counter(&self) -> u64 {
        let previous = self.counter.fetch_add(1, Ordering::Relaxed);
        previous.wrapping_add(1) % SEQUENCE_MODULUS
    }
}
