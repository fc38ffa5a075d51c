//! # sm-engine — Workflow Coordinator
//!
//! Wires the stage model, transition detector and notification composer to
//! the storage collaborators.
//!
//! ## Modules
//!
//! - **Coordinator** (`coordinator.rs`): `WorkflowCoordinator` with
//!   `create_case`, `apply_update`, `apply_with` and `record_review`.
//! - **Store** (`store.rs`): `SnapshotStore` / `NotificationStore` traits and
//!   their in-memory implementations.
//! - **Config** (`config.rs`): `EngineConfig` from the environment and the
//!   YAML `WorkflowConfig`, including the built-in standard workflows.
//! - **Metrics** (`metrics.rs`): atomic engine counters.
//!
//! ## Quick start
//!
//! ```
//! use sm_core::UserId;
//! use sm_engine::{
//!     EngineConfig, InMemoryNotificationStore, InMemorySnapshotStore, ReviewDecision,
//!     WorkflowConfig, WorkflowCoordinator,
//! };
//! use sm_state::{CaseSnapshot, CaseType, StageStatus};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let workflows = WorkflowConfig::standard()?.compile()?;
//! let engine = WorkflowCoordinator::new(
//!     EngineConfig::default(),
//!     workflows,
//!     InMemorySnapshotStore::new(),
//!     InMemoryNotificationStore::new(),
//! );
//!
//! let case_id = engine.next_case_id(CaseType::LeaveSchool)?;
//! let student = UserId::new("2023001")?;
//! engine.create_case(CaseSnapshot::new(case_id.clone(), CaseType::LeaveSchool, student))?;
//!
//! let outcome = engine.record_review(
//!     &case_id,
//!     CaseType::LeaveSchool,
//!     ReviewDecision::new("library", StageStatus::Approved),
//! )?;
//! assert_eq!(outcome.notifications.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod store;

pub use config::{
    CompiledWorkflows, EngineConfig, StageOrderPolicy, WorkflowConfig, WorkflowEntry,
    DEFAULT_MAX_UPDATE_ATTEMPTS, ENV_MAX_UPDATE_ATTEMPTS, ENV_STAGE_ORDER_POLICY,
};
pub use coordinator::{DispatchFailure, ReviewDecision, UpdateOutcome, WorkflowCoordinator};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use store::{
    InMemoryNotificationStore, InMemorySnapshotStore, NotificationStore, SnapshotStore,
    StoreError, StoredNotice, Versioned, INITIAL_VERSION,
};
