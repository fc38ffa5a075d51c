//! # Notification Events
//!
//! The value handed to the notification store. The engine builds it,
//! dispatches it, and forgets it; read/unread state belongs to the store.

use serde::{Deserialize, Serialize};
use sm_core::{CaseId, NoticeId, Timestamp, UserId};
use sm_state::{CaseType, Scope};

/// Literal source actor of overall-status notices.
pub const SYSTEM_ACTOR: &str = "system";

/// Display priority of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    /// Default for review outcomes.
    #[default]
    Important,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Important => "important",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a notice is published on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceActor {
    /// The reviewer of a stage.
    Reviewer {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reviewer_id: Option<UserId>,
    },
    /// The engine itself, for overall-status notices.
    System,
}

impl SourceActor {
    /// Reviewer id when recorded, the reviewer role otherwise, or `system`.
    pub fn actor(&self) -> &str {
        match self {
            Self::Reviewer {
                reviewer_id: Some(id),
                ..
            } => id.as_str(),
            Self::Reviewer { role, .. } => role,
            Self::System => SYSTEM_ACTOR,
        }
    }
}

impl std::fmt::Display for SourceActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.actor())
    }
}

/// A notice addressed to the subject of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Assigned by the coordinator at dispatch time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice_id: Option<NoticeId>,
    pub case_id: CaseId,
    pub case_type: CaseType,
    /// The transition scope that produced this notice.
    pub scope: Scope,
    pub recipient: UserId,
    pub title: String,
    pub body: String,
    pub category: String,
    pub priority: Priority,
    pub source: SourceActor,
    pub created_at: Timestamp,
}

impl NotificationEvent {
    /// Attach the dispatch identifier.
    pub fn with_notice_id(mut self, id: NoticeId) -> Self {
        self.notice_id = Some(id);
        self
    }
}
