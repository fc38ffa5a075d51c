//! # Stage Model
//!
//! Declares, per case type, the review stages a case passes through and the
//! rule that folds their statuses into one overall status.
//!
//! ## Combination Rules
//!
//! ```text
//! Sequential     advisor ──▶ admin            (award, appeal, status change)
//! Parallel-AND   dormitory ┐
//!                library   ├──▶ overall        (leave-school clearance)
//!                finance   │
//!                admin     ┘
//! ```
//!
//! Both rules obey the same law: the case is `Rejected` if any stage is
//! `Rejected`, `Approved` only if every stage is `Approved`, otherwise
//! `InProgress`. They differ in what a later stage's status means: under
//! `Sequential` it is only meaningful once every earlier stage is approved,
//! which the optional ordering check in [`CaseWorkflow::ordering_violation`]
//! can enforce. `combine` itself never consults call history, only the map.
//!
//! A stage missing from a status map reads as `Pending`. A key in the map
//! that the workflow does not declare is a configuration error.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sm_core::ConfigError;

use crate::status::{OverallLabels, OverallStatus, StageLabels, StageStatus};

// ─── Case Type ───────────────────────────────────────────────────────

/// The kinds of reviewable case records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    /// Award application.
    Award,
    /// Disciplinary punishment.
    Punishment,
    /// Appeal against a punishment.
    Appeal,
    /// Change of enrolment status (transfer, suspension, ...).
    StatusChange,
    /// Leave-school clearance.
    LeaveSchool,
}

impl CaseType {
    /// All case types, in declaration order.
    pub const ALL: [CaseType; 5] = [
        Self::Award,
        Self::Punishment,
        Self::Appeal,
        Self::StatusChange,
        Self::LeaveSchool,
    ];

    /// Snake-case name used in configuration and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Award => "award",
            Self::Punishment => "punishment",
            Self::Appeal => "appeal",
            Self::StatusChange => "status_change",
            Self::LeaveSchool => "leave_school",
        }
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownCaseType(s.to_string()))
    }
}

// ─── Combination Rule ────────────────────────────────────────────────

/// How stage statuses fold into the overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// Stages are reviewed in declared order.
    Sequential,
    /// Stages are reviewed independently; all must approve.
    ParallelAnd,
}

// ─── Stage Definition ────────────────────────────────────────────────

/// One review checkpoint of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    /// Key used in snapshot stage maps and template scopes.
    pub name: String,
    /// Human-readable stage name, e.g. "dormitory review".
    pub label: String,
    /// Role of the reviewer acting on this stage, e.g. "advisor".
    pub reviewer_role: String,
}

impl StageDef {
    /// Convenience constructor.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        reviewer_role: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            reviewer_role: reviewer_role.into(),
        }
    }
}

// ─── Case Workflow ───────────────────────────────────────────────────

/// The stage model of one case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseWorkflow {
    pub case_type: CaseType,
    pub rule: CombinationRule,
    /// Prefix of generated case identifiers, e.g. `AW`.
    #[serde(default)]
    pub id_prefix: String,
    /// Stages in declared order.
    pub stages: Vec<StageDef>,
    #[serde(default)]
    pub stage_labels: StageLabels,
    #[serde(default)]
    pub overall_labels: OverallLabels,
}

impl CaseWorkflow {
    /// A workflow with default labels and no id prefix.
    pub fn new(case_type: CaseType, rule: CombinationRule, stages: Vec<StageDef>) -> Self {
        Self {
            case_type,
            rule,
            id_prefix: String::new(),
            stages,
            stage_labels: StageLabels::default(),
            overall_labels: OverallLabels::default(),
        }
    }

    /// Startup validation: at least one stage, no duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyWorkflow(self.case_type.to_string()));
        }
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}.stages.name", self.case_type),
                    value: stage.name.clone(),
                    reason: "stage name must not be empty".to_string(),
                });
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage {
                    case_type: self.case_type.to_string(),
                    stage: stage.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look up a declared stage.
    pub fn stage(&self, name: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Look up a declared stage, failing with a configuration error.
    pub fn require_stage(&self, name: &str) -> Result<&StageDef, ConfigError> {
        self.stage(name).ok_or_else(|| ConfigError::UnknownStage {
            case_type: self.case_type.to_string(),
            stage: name.to_string(),
        })
    }

    /// Declared stage names, in order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    /// Reject any key that is not a declared stage.
    pub fn check_stage_keys<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> Result<(), ConfigError> {
        for key in keys {
            self.require_stage(key)?;
        }
        Ok(())
    }

    /// Derive the overall status from a stage status map.
    ///
    /// Absent stages read as `Pending`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] if the map names an undeclared stage.
    pub fn combine(
        &self,
        statuses: &BTreeMap<String, StageStatus>,
    ) -> Result<OverallStatus, ConfigError> {
        self.check_stage_keys(statuses.keys())?;
        let status_of = |name: &str| statuses.get(name).copied().unwrap_or_default();

        let overall = match self.rule {
            CombinationRule::Sequential => {
                let mut all_approved = true;
                for name in self.stage_names() {
                    match status_of(name) {
                        StageStatus::Rejected => return Ok(OverallStatus::Rejected),
                        StageStatus::Pending => all_approved = false,
                        StageStatus::Approved => {}
                    }
                }
                if all_approved {
                    OverallStatus::Approved
                } else {
                    OverallStatus::InProgress
                }
            }
            CombinationRule::ParallelAnd => {
                let statuses: Vec<StageStatus> = self.stage_names().map(status_of).collect();
                if statuses.contains(&StageStatus::Rejected) {
                    OverallStatus::Rejected
                } else if statuses.iter().all(|s| *s == StageStatus::Approved) {
                    OverallStatus::Approved
                } else {
                    OverallStatus::InProgress
                }
            }
        };
        Ok(overall)
    }

    /// For sequential workflows, the first stage that moved off `Pending`
    /// while an earlier stage is not yet approved, paired with that earlier
    /// stage. Always `None` for parallel workflows.
    pub fn ordering_violation(
        &self,
        statuses: &BTreeMap<String, StageStatus>,
    ) -> Option<(String, String)> {
        if self.rule != CombinationRule::Sequential {
            return None;
        }
        let mut blocking: Option<&str> = None;
        for name in self.stage_names() {
            let status = statuses.get(name).copied().unwrap_or_default();
            if let Some(earlier) = blocking {
                if status != StageStatus::Pending {
                    return Some((name.to_string(), earlier.to_string()));
                }
            } else if status != StageStatus::Approved {
                blocking = Some(name);
            }
        }
        None
    }
}

// ─── Stage Model Registry ────────────────────────────────────────────

/// Every case type's workflow, keyed by case type.
#[derive(Debug, Clone, Default)]
pub struct StageModel {
    workflows: HashMap<CaseType, CaseWorkflow>,
}

impl StageModel {
    /// Build and validate a registry.
    ///
    /// # Errors
    ///
    /// Any [`CaseWorkflow::validate`] failure, or a case type declared twice.
    pub fn new(workflows: impl IntoIterator<Item = CaseWorkflow>) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for workflow in workflows {
            workflow.validate()?;
            let case_type = workflow.case_type;
            if map.insert(case_type, workflow).is_some() {
                return Err(ConfigError::DuplicateCaseType(case_type.to_string()));
            }
        }
        Ok(Self { workflows: map })
    }

    /// The workflow for a case type.
    pub fn workflow(&self, case_type: CaseType) -> Result<&CaseWorkflow, ConfigError> {
        self.workflows
            .get(&case_type)
            .ok_or_else(|| ConfigError::UnknownCaseType(case_type.to_string()))
    }

    /// `Combine(caseType, stageStatuses)`.
    pub fn combine(
        &self,
        case_type: CaseType,
        statuses: &BTreeMap<String, StageStatus>,
    ) -> Result<OverallStatus, ConfigError> {
        self.workflow(case_type)?.combine(statuses)
    }

    /// Declared case types, sorted.
    pub fn case_types(&self) -> Vec<CaseType> {
        let mut types: Vec<CaseType> = self.workflows.keys().copied().collect();
        types.sort();
        types
    }

    /// Number of declared case types.
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    /// Whether no case type is declared.
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
