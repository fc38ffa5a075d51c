//! # Transition Detector
//!
//! Diffs two snapshots of the same case into the list of status changes
//! that occurred between them.
//!
//! ## Algorithm
//!
//! 1. Every declared stage is compared, absent entries reading as
//!    `Pending`. A stage whose status differs emits a `stage:<name>`
//!    transition. `Pending → Pending` is not a change.
//! 2. The overall status is derived with `combine` on both stage maps. If
//!    the two derived values differ, an `overall` transition is emitted
//!    carrying those derived values; the snapshots' stored `overall` fields
//!    are never consulted.
//! 3. With no `before` (case creation) nothing is emitted.
//!
//! Output order is declared stage order, then `overall`. Backward moves
//! (`Approved → Pending`) are reported like any other change; deciding
//! whether they notify is the composer's business.

use serde::{Deserialize, Serialize};
use sm_core::{CaseId, WorkflowError};

use crate::model::{CaseType, CaseWorkflow, StageModel};
use crate::snapshot::CaseSnapshot;
use crate::status::{Outcome, OverallStatus, StageStatus};

/// Scope key of the overall status in templates and transition scopes.
pub const OVERALL_SCOPE: &str = "overall";

// ─── Scope ───────────────────────────────────────────────────────────

/// What a transition is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// A named stage.
    Stage(String),
    /// The case as a whole.
    Overall,
}

impl Scope {
    /// Template key: the stage name, or `overall`.
    pub fn key(&self) -> &str {
        match self {
            Self::Stage(name) => name,
            Self::Overall => OVERALL_SCOPE,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage(name) => write!(f, "stage:{name}"),
            Self::Overall => f.write_str(OVERALL_SCOPE),
        }
    }
}

// ─── Transition ──────────────────────────────────────────────────────

/// The old and new status of a changed scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Change {
    /// A stage changed status.
    Stage {
        stage: String,
        from: StageStatus,
        to: StageStatus,
    },
    /// The derived overall status changed.
    Overall {
        from: OverallStatus,
        to: OverallStatus,
    },
}

/// A detected status change of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub case_id: CaseId,
    pub case_type: CaseType,
    #[serde(flatten)]
    pub change: Change,
}

impl Transition {
    /// The scope this transition is about.
    pub fn scope(&self) -> Scope {
        match &self.change {
            Change::Stage { stage, .. } => Scope::Stage(stage.clone()),
            Change::Overall { .. } => Scope::Overall,
        }
    }

    /// The terminal outcome reached, or `None` when the new status is
    /// `Pending` / `InProgress`.
    pub fn outcome(&self) -> Option<Outcome> {
        match &self.change {
            Change::Stage { to, .. } => to.outcome(),
            Change::Overall { to, .. } => to.outcome(),
        }
    }

    /// Stage name, for stage transitions.
    pub fn stage(&self) -> Option<&str> {
        match &self.change {
            Change::Stage { stage, .. } => Some(stage),
            Change::Overall { .. } => None,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.change {
            Change::Stage { stage, from, to } => {
                write!(f, "{} stage:{stage} {from} -> {to}", self.case_id)
            }
            Change::Overall { from, to } => {
                write!(f, "{} overall {from} -> {to}", self.case_id)
            }
        }
    }
}

// ─── Diff ────────────────────────────────────────────────────────────

/// `Diff(before, after)` against one workflow.
///
/// # Errors
///
/// - [`WorkflowError::CaseMismatch`] if the snapshots disagree on case id or
///   case type, or do not belong to `workflow`.
/// - [`WorkflowError::Configuration`] if either snapshot names an
///   undeclared stage.
pub fn diff(
    workflow: &CaseWorkflow,
    before: Option<&CaseSnapshot>,
    after: &CaseSnapshot,
) -> Result<Vec<Transition>, WorkflowError> {
    if after.case_type != workflow.case_type {
        return Err(WorkflowError::CaseMismatch {
            expected: workflow.case_type.to_string(),
            actual: after.case_type.to_string(),
        });
    }
    workflow.check_stage_keys(after.stages.keys())?;

    let Some(before) = before else {
        return Ok(Vec::new());
    };
    if before.case_id != after.case_id {
        return Err(WorkflowError::CaseMismatch {
            expected: before.case_id.to_string(),
            actual: after.case_id.to_string(),
        });
    }
    if before.case_type != after.case_type {
        return Err(WorkflowError::CaseMismatch {
            expected: before.case_type.to_string(),
            actual: after.case_type.to_string(),
        });
    }
    workflow.check_stage_keys(before.stages.keys())?;

    let mut transitions = Vec::new();
    for name in workflow.stage_names() {
        let from = before.stage_status(name);
        let to = after.stage_status(name);
        if from != to {
            transitions.push(Transition {
                case_id: after.case_id.clone(),
                case_type: after.case_type,
                change: Change::Stage {
                    stage: name.to_string(),
                    from,
                    to,
                },
            });
        }
    }

    let overall_before = workflow.combine(&before.status_map())?;
    let overall_after = workflow.combine(&after.status_map())?;
    if overall_before != overall_after {
        transitions.push(Transition {
            case_id: after.case_id.clone(),
            case_type: after.case_type,
            change: Change::Overall {
                from: overall_before,
                to: overall_after,
            },
        });
    }

    for t in &transitions {
        tracing::debug!(case_id = %t.case_id, scope = %t.scope(), "transition detected: {t}");
    }

    Ok(transitions)
}

impl StageModel {
    /// `Diff(before, after)`, resolving the workflow from `after.case_type`.
    pub fn diff(
        &self,
        before: Option<&CaseSnapshot>,
        after: &CaseSnapshot,
    ) -> Result<Vec<Transition>, WorkflowError> {
        let workflow = self.workflow(after.case_type)?;
        diff(workflow, before, after)
    }
}
