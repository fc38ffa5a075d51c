//! # Error Types — Workflow Error Taxonomy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`.
//!
//! ## Classes
//!
//! - `NotFound`: case id unknown. Surfaced to the caller, never retried.
//! - `Configuration`: unknown case type, stage, or template key. A
//!   deployment bug; startup validation is expected to catch it first.
//! - `StorageConflict`: optimistic version mismatch that survived the
//!   coordinator's bounded retry.
//! - `PartialDispatchFailure`: the snapshot committed but one or more
//!   notices failed to persist. Reported alongside a successful update,
//!   never instead of one.

use thiserror::Error;

/// Top-level error type returned by the workflow engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// No snapshot is stored under this case id.
    #[error("case {case_id} not found")]
    NotFound {
        /// The case id that was looked up.
        case_id: String,
    },

    /// A case with this id already exists.
    #[error("case {case_id} already exists")]
    AlreadyExists {
        /// The conflicting case id.
        case_id: String,
    },

    /// Workflow configuration is inconsistent with the request.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Concurrent updates kept invalidating the loaded snapshot.
    #[error("storage conflict on case {case_id} after {attempts} attempt(s)")]
    StorageConflict {
        /// The contended case.
        case_id: String,
        /// Number of load-diff-persist attempts made.
        attempts: u32,
    },

    /// The storage collaborator failed for a reason other than a conflict.
    #[error("storage error: {0}")]
    Storage(String),

    /// Notices failed to persist after the snapshot was committed.
    #[error("{failed} of {total} notification(s) for case {case_id} failed to dispatch")]
    PartialDispatchFailure {
        /// The case whose update produced the notices.
        case_id: String,
        /// Number of notices that failed.
        failed: usize,
        /// Number of notices composed.
        total: usize,
    },

    /// The proposed snapshot does not describe the case named by the call.
    #[error("snapshot mismatch: expected {expected}, got {actual}")]
    CaseMismatch {
        /// What the call named.
        expected: String,
        /// What the snapshot carried.
        actual: String,
    },

    /// A later sequential stage moved before an earlier one was approved.
    #[error("case {case_id}: stage {stage} cannot advance before {blocking} is approved")]
    OutOfOrder {
        /// The case being updated.
        case_id: String,
        /// The stage that advanced early.
        stage: String,
        /// The earlier stage that is not yet approved.
        blocking: String,
    },

    /// A caller-supplied value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WorkflowError {
    /// Whether the coordinator should retry the load-diff-persist sequence.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageConflict { .. })
    }
}

/// Configuration errors. Fatal: they indicate a deployment bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No workflow is declared for this case type.
    #[error("unknown case type {0:?}")]
    UnknownCaseType(String),

    /// The stage is not declared for the case type.
    #[error("case type {case_type} declares no stage {stage:?}")]
    UnknownStage {
        /// Case type name.
        case_type: String,
        /// Offending stage name.
        stage: String,
    },

    /// A stage name appears twice in one workflow.
    #[error("case type {case_type} declares stage {stage:?} more than once")]
    DuplicateStage {
        /// Case type name.
        case_type: String,
        /// Duplicated stage name.
        stage: String,
    },

    /// A case type appears twice in one configuration.
    #[error("case type {0} is declared more than once")]
    DuplicateCaseType(String),

    /// A workflow with no stages cannot derive an outcome.
    #[error("case type {0} declares no stages")]
    EmptyWorkflow(String),

    /// A template names a scope the workflow does not declare.
    #[error("case type {case_type} has a template for undeclared scope {scope:?}")]
    UnknownTemplateScope {
        /// Case type name.
        case_type: String,
        /// The template's scope key.
        scope: String,
    },

    /// A configuration value could not be interpreted.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Configuration key (environment variable or YAML path).
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse workflow configuration: {0}")]
    Parse(String),
}
