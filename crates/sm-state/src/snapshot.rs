//! # Case Snapshots
//!
//! A [`CaseSnapshot`] is an immutable view of one case at one version: its
//! stage map, the overall status the caller claims, and an opaque domain
//! payload (award name, punishment type, dates, amounts). The engine only
//! ever reads snapshots. It diffs a `before` against an `after` and
//! recomputes the overall status itself rather than trusting the stored
//! field.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sm_core::{CaseId, UserId};

use crate::model::CaseType;
use crate::status::{OverallStatus, StageStatus};

/// One stage's entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub status: StageStatus,
    /// Reviewer who set the current status, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<UserId>,
    /// Reviewer's free-text opinion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opinion: Option<String>,
}

impl StageEntry {
    /// An entry with no reviewer attribution.
    pub fn new(status: StageStatus) -> Self {
        Self {
            status,
            reviewer_id: None,
            opinion: None,
        }
    }

    /// Attribute the entry to a reviewer.
    pub fn reviewed_by(mut self, reviewer: UserId) -> Self {
        self.reviewer_id = Some(reviewer);
        self
    }

    /// Attach a reviewer opinion.
    pub fn with_opinion(mut self, opinion: impl Into<String>) -> Self {
        self.opinion = Some(opinion.into());
        self
    }
}

impl Default for StageEntry {
    fn default() -> Self {
        Self::new(StageStatus::Pending)
    }
}

/// A point-in-time view of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_id: CaseId,
    pub case_type: CaseType,
    /// The student the case is about; recipient of every notice.
    pub subject: UserId,
    /// Stage name to stage entry. Missing stages read as `Pending`.
    #[serde(default)]
    pub stages: BTreeMap<String, StageEntry>,
    /// Overall status as last written. Not trusted for diffing.
    #[serde(default)]
    pub overall: OverallStatus,
    /// Domain fields, opaque to the engine except for template rendering.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CaseSnapshot {
    /// A snapshot with every stage pending and an empty payload.
    pub fn new(case_id: CaseId, case_type: CaseType, subject: UserId) -> Self {
        Self {
            case_id,
            case_type,
            subject,
            stages: BTreeMap::new(),
            overall: OverallStatus::InProgress,
            payload: serde_json::Value::Null,
        }
    }

    /// Builder: set one stage's status.
    pub fn with_stage(mut self, name: impl Into<String>, status: StageStatus) -> Self {
        self.stages.insert(name.into(), StageEntry::new(status));
        self
    }

    /// Builder: set one stage's full entry.
    pub fn with_entry(mut self, name: impl Into<String>, entry: StageEntry) -> Self {
        self.stages.insert(name.into(), entry);
        self
    }

    /// Builder: set the claimed overall status.
    pub fn with_overall(mut self, overall: OverallStatus) -> Self {
        self.overall = overall;
        self
    }

    /// Builder: set the domain payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// A stage's status, `Pending` if absent.
    pub fn stage_status(&self, name: &str) -> StageStatus {
        self.stages
            .get(name)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// A stage's entry, if present.
    pub fn stage(&self, name: &str) -> Option<&StageEntry> {
        self.stages.get(name)
    }

    /// The stage map reduced to statuses.
    pub fn status_map(&self) -> BTreeMap<String, StageStatus> {
        self.stages
            .iter()
            .map(|(name, entry)| (name.clone(), entry.status))
            .collect()
    }

    /// Replay the edits `self` makes relative to `base` onto `current`.
    ///
    /// Stage entries, the subject and the payload that `self` changed win;
    /// everything else keeps `current`'s value, so decisions written since
    /// `base` was read survive. A stage `self` dropped is dropped.
    pub fn rebased(&self, base: &CaseSnapshot, current: &CaseSnapshot) -> CaseSnapshot {
        let mut merged = current.clone();
        let names: BTreeSet<&String> = base.stages.keys().chain(self.stages.keys()).collect();
        for name in names {
            let edited = self.stages.get(name);
            if edited == base.stages.get(name) {
                continue;
            }
            match edited {
                Some(entry) => {
                    merged.stages.insert(name.clone(), entry.clone());
                }
                None => {
                    merged.stages.remove(name);
                }
            }
        }
        if self.subject != base.subject {
            merged.subject = self.subject.clone();
        }
        if self.payload != base.payload {
            merged.payload = self.payload.clone();
        }
        merged
    }

    /// A top-level payload field rendered as text, for templates.
    ///
    /// Strings render bare, numbers and booleans via `Display`; objects,
    /// arrays, null and missing keys yield `None`.
    pub fn payload_text(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
