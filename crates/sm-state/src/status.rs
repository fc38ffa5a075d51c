//! # Status Vocabularies
//!
//! Every review stage speaks the same three-valued semantic vocabulary,
//! [`StageStatus`]; the case as a whole speaks [`OverallStatus`]. Each case
//! type declares its own domain labels for those values (a punishment is
//! "in effect" rather than "approved") through [`StageLabels`] and
//! [`OverallLabels`]. Labels are presentation; only the semantic values take
//! part in combination and diffing.

use serde::{Deserialize, Serialize};

// ─── Outcome ─────────────────────────────────────────────────────────

/// A terminal review outcome, shared by stages and the overall case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The reviewer or the case approved.
    Approved,
    /// The reviewer or the case rejected.
    Rejected,
}

impl Outcome {
    /// Lowercase name used in configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Stage Status ────────────────────────────────────────────────────

/// Status of a single review stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Awaiting review. The initial status of every stage.
    #[default]
    Pending,
    /// The stage's reviewer approved.
    Approved,
    /// The stage's reviewer rejected.
    Rejected,
}

impl StageStatus {
    /// The terminal outcome this status represents, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Pending => None,
            Self::Approved => Some(Outcome::Approved),
            Self::Rejected => Some(Outcome::Rejected),
        }
    }

    /// Whether this status is a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// Lowercase semantic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Overall Status ──────────────────────────────────────────────────

/// Case-wide status derived from the stage statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// At least one stage is still pending and none rejected.
    #[default]
    InProgress,
    /// Every stage approved.
    Approved,
    /// At least one stage rejected.
    Rejected,
}

impl OverallStatus {
    /// The terminal outcome this status represents, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::InProgress => None,
            Self::Approved => Some(Outcome::Approved),
            Self::Rejected => Some(Outcome::Rejected),
        }
    }

    /// Whether this status is a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// Lowercase semantic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Domain Labels ───────────────────────────────────────────────────

/// Domain labels for the three stage statuses of one case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLabels {
    pub pending: String,
    pub approved: String,
    pub rejected: String,
}

impl Default for StageLabels {
    fn default() -> Self {
        Self {
            pending: "pending".to_string(),
            approved: "approved".to_string(),
            rejected: "rejected".to_string(),
        }
    }
}

impl StageLabels {
    /// The label displayed for a status.
    pub fn label(&self, status: StageStatus) -> &str {
        match status {
            StageStatus::Pending => &self.pending,
            StageStatus::Approved => &self.approved,
            StageStatus::Rejected => &self.rejected,
        }
    }

    /// Map a domain label (or a semantic name) back to a status.
    pub fn parse(&self, label: &str) -> Option<StageStatus> {
        let label = label.trim();
        [
            StageStatus::Pending,
            StageStatus::Approved,
            StageStatus::Rejected,
        ]
        .into_iter()
        .find(|s| self.label(*s).eq_ignore_ascii_case(label) || s.as_str() == label)
    }
}

/// Domain labels for the three overall statuses of one case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverallLabels {
    pub in_progress: String,
    pub approved: String,
    pub rejected: String,
}

impl Default for OverallLabels {
    fn default() -> Self {
        Self {
            in_progress: "in progress".to_string(),
            approved: "approved".to_string(),
            rejected: "rejected".to_string(),
        }
    }
}

impl OverallLabels {
    /// The label displayed for a status.
    pub fn label(&self, status: OverallStatus) -> &str {
        match status {
            OverallStatus::InProgress => &self.in_progress,
            OverallStatus::Approved => &self.approved,
            OverallStatus::Rejected => &self.rejected,
        }
    }

    /// Map a domain label (or a semantic name) back to a status.
    pub fn parse(&self, label: &str) -> Option<OverallStatus> {
        let label = label.trim();
        [
            OverallStatus::InProgress,
            OverallStatus::Approved,
            OverallStatus::Rejected,
        ]
        .into_iter()
        .find(|s| self.label(*s).eq_ignore_ascii_case(label) || s.as_str() == label)
    }
}
