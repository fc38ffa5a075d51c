//! # sm-state — Review Stage Model and Transition Detector
//!
//! The data side of the review workflow: what stages a case type has, how
//! their statuses combine into an overall status, what a case looks like at
//! one point in time, and what changed between two such points.
//!
//! ## Modules
//!
//! - **Status** (`status.rs`): `StageStatus {Pending, Approved, Rejected}`,
//!   `OverallStatus {InProgress, Approved, Rejected}`, and per-case-type
//!   domain labels.
//!
//! - **Model** (`model.rs`): `CaseType`, `CombinationRule`
//!   (`Sequential` / `ParallelAnd`), `CaseWorkflow` and the `StageModel`
//!   registry with `combine`.
//!
//! - **Snapshot** (`snapshot.rs`): the immutable `CaseSnapshot` value.
//!
//! - **Transition** (`transition.rs`): `diff(before, after)` producing
//!   stage and overall `Transition`s.
//!
//! ## Design
//!
//! One generic engine configured per case type. Nothing in this crate
//! branches on `CaseType`; a new case type is a new `CaseWorkflow` value.

pub mod model;
pub mod snapshot;
pub mod status;
pub mod transition;

// ─── Model re-exports ───────────────────────────────────────────────

pub use model::{CaseType, CaseWorkflow, CombinationRule, StageDef, StageModel};

// ─── Snapshot re-exports ────────────────────────────────────────────

pub use snapshot::{CaseSnapshot, StageEntry};

// ─── Status re-exports ──────────────────────────────────────────────

pub use status::{OverallLabels, OverallStatus, Outcome, StageLabels, StageStatus};

// ─── Transition re-exports ──────────────────────────────────────────

pub use transition::{diff, Change, Scope, Transition, OVERALL_SCOPE};
