//! # Workflow Coordinator
//!
//! Orchestrates one update of one case:
//!
//! ```text
//! load before ──▶ propose after ──▶ canonicalise overall ──▶ diff ──▶ compose
//!      ▲                                                                │
//!      └──────────── version conflict (bounded retry) ◀── put(CAS) ◀────┘
//!                                                            │
//!                                                 dispatch notices (ids)
//! ```
//!
//! ## Serialization
//!
//! The store write is a compare-and-swap on the version read in the same
//! attempt, so the diff is always computed against the snapshot the write
//! replaces. A concurrent writer on the same case makes the CAS fail; the
//! attempt is discarded (nothing has been dispatched yet) and the sequence
//! reruns against the fresh snapshot. Different cases never contend.
//!
//! Updates expressed as a function of `before` ([`WorkflowCoordinator::apply_with`],
//! [`WorkflowCoordinator::record_review`]) re-derive their proposal on each
//! attempt, so concurrent reviewers of different stages both land.
//! [`WorkflowCoordinator::apply_update`] treats its proposal as an edit of
//! the snapshot it first loaded and replays that edit onto the fresh
//! snapshot on retry. [`WorkflowCoordinator::apply_update_from`] takes the
//! snapshot the caller read explicitly.
//!
//! ## Dispatch
//!
//! Notices are composed before the write and dispatched after it. A failed
//! dispatch never rolls the snapshot back; it is logged, counted and
//! reported in [`UpdateOutcome::dispatch_failures`].

use std::sync::Arc;

use serde::Serialize;
use sm_core::{CaseId, NoticeId, SequenceGenerator, Timestamp, UserId, WorkflowError};
use sm_notify::{NotificationComposer, NotificationEvent};
use sm_state::{
    diff, CaseSnapshot, CaseType, CaseWorkflow, Scope, StageEntry, StageStatus, Transition,
};

use crate::config::{CompiledWorkflows, EngineConfig, StageOrderPolicy};
use crate::metrics::EngineMetrics;
use crate::store::{NotificationStore, SnapshotStore, StoreError, Versioned};

// ─── Request / Outcome Types ─────────────────────────────────────────

/// One reviewer's decision on one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    pub stage: String,
    pub status: StageStatus,
    pub reviewer_id: Option<UserId>,
    pub opinion: Option<String>,
}

impl ReviewDecision {
    pub fn new(stage: impl Into<String>, status: StageStatus) -> Self {
        Self {
            stage: stage.into(),
            status,
            reviewer_id: None,
            opinion: None,
        }
    }

    pub fn by(mut self, reviewer: UserId) -> Self {
        self.reviewer_id = Some(reviewer);
        self
    }

    pub fn with_opinion(mut self, opinion: impl Into<String>) -> Self {
        self.opinion = Some(opinion.into());
        self
    }
}

/// A notice that could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub notice_id: NoticeId,
    pub scope: Scope,
    pub reason: String,
}

/// Result of an accepted or rejected update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    /// False only when the store refused the write.
    pub accepted: bool,
    /// Version stored after the call.
    pub version: u64,
    /// Detected transitions, declared stage order then overall.
    pub transitions: Vec<Transition>,
    /// Every composed notice with its assigned id, in transition order,
    /// including ones listed in `dispatch_failures`.
    pub notifications: Vec<NotificationEvent>,
    pub dispatch_failures: Vec<DispatchFailure>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

impl UpdateOutcome {
    /// The soft error to surface when some notices failed to persist.
    pub fn dispatch_error(&self) -> Option<WorkflowError> {
        let case_id = self.notifications.first()?.case_id.to_string();
        if self.dispatch_failures.is_empty() {
            return None;
        }
        Some(WorkflowError::PartialDispatchFailure {
            case_id,
            failed: self.dispatch_failures.len(),
            total: self.notifications.len(),
        })
    }
}

// ─── Coordinator ─────────────────────────────────────────────────────

/// The workflow engine entry point.
#[derive(Debug)]
pub struct WorkflowCoordinator<S, N> {
    config: EngineConfig,
    workflows: CompiledWorkflows,
    composer: NotificationComposer,
    snapshots: S,
    notices: N,
    sequence: Arc<SequenceGenerator>,
    metrics: EngineMetrics,
}

impl<S: SnapshotStore, N: NotificationStore> WorkflowCoordinator<S, N> {
    /// A coordinator using the process-wide sequence generator.
    pub fn new(
        config: EngineConfig,
        workflows: CompiledWorkflows,
        snapshots: S,
        notices: N,
    ) -> Self {
        let composer = workflows.composer();
        Self {
            config,
            workflows,
            composer,
            snapshots,
            notices,
            sequence: SequenceGenerator::shared(),
            metrics: EngineMetrics::new(),
        }
    }

    /// Builder: use a dedicated sequence generator.
    pub fn with_sequence(mut self, sequence: Arc<SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn snapshot_store(&self) -> &S {
        &self.snapshots
    }

    pub fn notification_store(&self) -> &N {
        &self.notices
    }

    /// A fresh case identifier with the case type's prefix.
    pub fn next_case_id(&self, case_type: CaseType) -> Result<CaseId, WorkflowError> {
        let workflow = self.workflows.model.workflow(case_type)?;
        Ok(self.sequence.next_case_id(&workflow.id_prefix))
    }

    /// The stored snapshot of a case.
    pub fn load(&self, case_id: &CaseId) -> Result<Versioned, WorkflowError> {
        self.snapshots
            .get(case_id)
            .map_err(|e| storage_error(case_id, e))?
            .ok_or_else(|| WorkflowError::NotFound {
                case_id: case_id.to_string(),
            })
    }

    /// Store the first snapshot of a case. Never notifies.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::AlreadyExists`], configuration errors for undeclared
    /// stages, and [`WorkflowError::OutOfOrder`] under the enforcing policy.
    pub fn create_case(&self, snapshot: CaseSnapshot) -> Result<u64, WorkflowError> {
        let workflow = self.workflows.model.workflow(snapshot.case_type)?;
        let snapshot = self.canonicalise(workflow, snapshot)?;
        let case_id = snapshot.case_id.clone();
        match self.snapshots.insert(snapshot) {
            Ok(version) => {
                tracing::info!(case_id = %case_id, case_type = %workflow.case_type, "case created");
                Ok(version)
            }
            Err(StoreError::Conflict { .. }) => Err(WorkflowError::AlreadyExists {
                case_id: case_id.to_string(),
            }),
            Err(e) => Err(storage_error(&case_id, e)),
        }
    }

    /// `ApplyUpdate(caseID, caseType, proposedAfter)`.
    ///
    /// `proposed_after` is an edit of the snapshot loaded on the first
    /// attempt. After a version conflict the edit is replayed onto the
    /// fresh snapshot, so stages another writer changed in between keep
    /// their new values.
    pub fn apply_update(
        &self,
        case_id: &CaseId,
        case_type: CaseType,
        proposed_after: CaseSnapshot,
    ) -> Result<UpdateOutcome, WorkflowError> {
        let mut base: Option<CaseSnapshot> = None;
        self.apply_with(case_id, case_type, |before| {
            if let Some(base) = &base {
                return Ok(proposed_after.rebased(base, before));
            }
            base = Some(before.clone());
            Ok(proposed_after.clone())
        })
    }

    /// [`apply_update`](Self::apply_update) with the edit measured against
    /// `base`, the snapshot the caller read when building `proposed_after`.
    pub fn apply_update_from(
        &self,
        case_id: &CaseId,
        case_type: CaseType,
        base: &CaseSnapshot,
        proposed_after: CaseSnapshot,
    ) -> Result<UpdateOutcome, WorkflowError> {
        check_identity(case_id, case_type, base)?;
        check_identity(case_id, case_type, &proposed_after)?;
        self.apply_with(case_id, case_type, |before| {
            Ok(proposed_after.rebased(base, before))
        })
    }

    /// Record one stage decision on top of the current snapshot.
    pub fn record_review(
        &self,
        case_id: &CaseId,
        case_type: CaseType,
        decision: ReviewDecision,
    ) -> Result<UpdateOutcome, WorkflowError> {
        let workflow = self.workflows.model.workflow(case_type)?;
        workflow.require_stage(&decision.stage)?;
        self.apply_with(case_id, case_type, |before| {
            let entry = StageEntry {
                status: decision.status,
                reviewer_id: decision.reviewer_id.clone(),
                opinion: decision.opinion.clone(),
            };
            Ok(before.clone().with_entry(decision.stage.clone(), entry))
        })
    }

    /// Apply the snapshot `propose` derives from the current one.
    ///
    /// `propose` runs once per attempt against the freshly loaded snapshot.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::NotFound`] if the case does not exist.
    /// - [`WorkflowError::CaseMismatch`] if the stored or proposed snapshot
    ///   names another case id or case type.
    /// - [`WorkflowError::Configuration`] for undeclared stages.
    /// - [`WorkflowError::OutOfOrder`] under [`StageOrderPolicy::Enforce`].
    /// - [`WorkflowError::StorageConflict`] once the attempt bound is used up.
    /// - [`WorkflowError::Storage`] for other store failures.
    pub fn apply_with<F>(
        &self,
        case_id: &CaseId,
        case_type: CaseType,
        mut propose: F,
    ) -> Result<UpdateOutcome, WorkflowError>
    where
        F: FnMut(&CaseSnapshot) -> Result<CaseSnapshot, WorkflowError>,
    {
        let workflow = self.workflows.model.workflow(case_type)?;
        let max_attempts = self.config.max_update_attempts.max(1);

        for attempt in 1..=max_attempts {
            let before = self.load(case_id)?;
            check_identity(case_id, case_type, &before.snapshot)?;

            let proposed = propose(&before.snapshot)?;
            check_identity(case_id, case_type, &proposed)?;
            let after = self.canonicalise(workflow, proposed)?;

            let transitions = diff(workflow, Some(&before.snapshot), &after)?;
            if transitions.is_empty() && after == before.snapshot {
                tracing::debug!(case_id = %case_id, "update is a no-op");
                return Ok(UpdateOutcome {
                    accepted: true,
                    version: before.version,
                    transitions,
                    notifications: Vec::new(),
                    dispatch_failures: Vec::new(),
                    attempts: attempt,
                });
            }

            let now = Timestamp::now();
            let composed = self.composer.compose_all(&transitions, &after, now)?;

            let version = match self.snapshots.put(case_id, after, before.version) {
                Ok(version) => version,
                Err(StoreError::Conflict { expected, actual }) => {
                    self.metrics.record_conflict();
                    tracing::warn!(
                        case_id = %case_id,
                        attempt,
                        expected,
                        actual,
                        "concurrent update, retrying"
                    );
                    continue;
                }
                Err(StoreError::Rejected(reason)) => {
                    tracing::warn!(case_id = %case_id, %reason, "store rejected update");
                    return Ok(UpdateOutcome {
                        accepted: false,
                        version: before.version,
                        transitions: Vec::new(),
                        notifications: Vec::new(),
                        dispatch_failures: Vec::new(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(storage_error(case_id, e)),
            };

            self.metrics.record_accepted(transitions.len());
            let (notifications, dispatch_failures) = self.dispatch(composed, now);
            tracing::info!(
                case_id = %case_id,
                case_type = %case_type,
                version,
                attempt,
                transitions = transitions.len(),
                notifications = notifications.len(),
                failed = dispatch_failures.len(),
                "update applied"
            );
            return Ok(UpdateOutcome {
                accepted: true,
                version,
                transitions,
                notifications,
                dispatch_failures,
                attempts: attempt,
            });
        }

        tracing::error!(
            case_id = %case_id,
            attempts = max_attempts,
            "update abandoned after repeated version conflicts"
        );
        Err(WorkflowError::StorageConflict {
            case_id: case_id.to_string(),
            attempts: max_attempts,
        })
    }

    // ── internals ────────────────────────────────────────────────────

    /// Check stage keys and ordering, then replace the caller's overall
    /// status with the derived one.
    fn canonicalise(
        &self,
        workflow: &CaseWorkflow,
        mut snapshot: CaseSnapshot,
    ) -> Result<CaseSnapshot, WorkflowError> {
        let statuses = snapshot.status_map();
        let derived = workflow.combine(&statuses)?;

        if self.config.stage_order == StageOrderPolicy::Enforce {
            if let Some((stage, blocking)) = workflow.ordering_violation(&statuses) {
                return Err(WorkflowError::OutOfOrder {
                    case_id: snapshot.case_id.to_string(),
                    stage,
                    blocking,
                });
            }
        }

        if snapshot.overall != derived {
            tracing::warn!(
                case_id = %snapshot.case_id,
                supplied = %snapshot.overall,
                derived = %derived,
                "caller-supplied overall status replaced"
            );
            snapshot.overall = derived;
        }
        Ok(snapshot)
    }

    fn dispatch(
        &self,
        composed: Vec<NotificationEvent>,
        now: Timestamp,
    ) -> (Vec<NotificationEvent>, Vec<DispatchFailure>) {
        let mut notifications = Vec::with_capacity(composed.len());
        let mut failures = Vec::new();
        for event in composed {
            let notice_id = self.sequence.next_notice_id(now);
            let event = event.with_notice_id(notice_id.clone());
            match self.notices.save(&event) {
                Ok(()) => {
                    self.metrics.record_dispatch(true);
                    tracing::debug!(
                        case_id = %event.case_id,
                        notice_id = %notice_id,
                        scope = %event.scope,
                        "notice dispatched"
                    );
                }
                Err(e) => {
                    self.metrics.record_dispatch(false);
                    tracing::warn!(
                        case_id = %event.case_id,
                        notice_id = %notice_id,
                        scope = %event.scope,
                        error = %e,
                        "notice dispatch failed"
                    );
                    failures.push(DispatchFailure {
                        notice_id,
                        scope: event.scope.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            notifications.push(event);
        }
        (notifications, failures)
    }
}

fn check_identity(
    case_id: &CaseId,
    case_type: CaseType,
    snapshot: &CaseSnapshot,
) -> Result<(), WorkflowError> {
    if &snapshot.case_id != case_id {
        return Err(WorkflowError::CaseMismatch {
            expected: case_id.to_string(),
            actual: snapshot.case_id.to_string(),
        });
    }
    if snapshot.case_type != case_type {
        return Err(WorkflowError::CaseMismatch {
            expected: case_type.to_string(),
            actual: snapshot.case_type.to_string(),
        });
    }
    Ok(())
}

fn storage_error(case_id: &CaseId, e: StoreError) -> WorkflowError {
    match e {
        StoreError::NotFound(_) => WorkflowError::NotFound {
            case_id: case_id.to_string(),
        },
        other => WorkflowError::Storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::store::{InMemoryNotificationStore, InMemorySnapshotStore};
    use serde_json::json;
    use sm_state::OverallStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Engine = WorkflowCoordinator<InMemorySnapshotStore, InMemoryNotificationStore>;

    fn engine(config: EngineConfig) -> Engine {
        let workflows = WorkflowConfig::standard().unwrap().compile().unwrap();
        WorkflowCoordinator::new(
            config,
            workflows,
            InMemorySnapshotStore::new(),
            InMemoryNotificationStore::new(),
        )
        .with_sequence(Arc::new(SequenceGenerator::new()))
    }

    fn award(engine: &Engine) -> CaseSnapshot {
        let id = engine.next_case_id(CaseType::Award).unwrap();
        CaseSnapshot::new(id, CaseType::Award, UserId::new("2023001").unwrap())
            .with_payload(json!({"award_name": "National Scholarship"}))
    }

    #[test]
    fn create_then_review_notifies_once() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        assert!(id.as_str().starts_with("AW"));
        assert_eq!(engine.create_case(case).unwrap(), 1);
        assert!(engine.notification_store().is_empty());

        let outcome = engine
            .record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("advisor", StageStatus::Approved)
                    .by(UserId::new("T1001").unwrap()),
            )
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.notifications.len(), 1);
        let notice = &outcome.notifications[0];
        assert_eq!(notice.source.actor(), "T1001");
        assert!(notice.notice_id.as_ref().unwrap().as_str().starts_with('N'));
        assert_eq!(
            notice.body,
            "Your application for \"National Scholarship\" was approved by the advisor."
        );
        assert_eq!(engine.notification_store().len(), 1);
        assert!(outcome.dispatch_error().is_none());
    }

    #[test]
    fn create_twice_is_already_exists() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        engine.create_case(case.clone()).unwrap();
        assert!(matches!(
            engine.create_case(case),
            Err(WorkflowError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn unknown_case_is_not_found() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        assert!(matches!(
            engine.apply_update(&id, CaseType::Award, case),
            Err(WorkflowError::NotFound { .. })
        ));
    }

    #[test]
    fn overall_status_is_canonicalised() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine).with_overall(OverallStatus::Approved);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();
        assert_eq!(
            engine.load(&id).unwrap().snapshot.overall,
            OverallStatus::InProgress
        );

        let after = engine
            .load(&id)
            .unwrap()
            .snapshot
            .with_stage("advisor", StageStatus::Rejected)
            .with_overall(OverallStatus::InProgress);
        let outcome = engine.apply_update(&id, CaseType::Award, after).unwrap();
        assert_eq!(outcome.notifications.len(), 2);
        assert_eq!(
            engine.load(&id).unwrap().snapshot.overall,
            OverallStatus::Rejected
        );
    }

    #[test]
    fn identical_update_is_idempotent() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();
        let after = engine
            .load(&id)
            .unwrap()
            .snapshot
            .with_stage("advisor", StageStatus::Approved);

        let first = engine.apply_update(&id, CaseType::Award, after.clone()).unwrap();
        let second = engine.apply_update(&id, CaseType::Award, after).unwrap();
        assert_eq!(first.notifications.len(), 1);
        assert!(second.accepted);
        assert!(second.transitions.is_empty());
        assert!(second.notifications.is_empty());
        assert_eq!(second.version, first.version);
    }

    #[test]
    fn mismatched_case_type_rejected() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        engine.create_case(case.clone()).unwrap();
        assert!(matches!(
            engine.apply_update(&id, CaseType::Appeal, case),
            Err(WorkflowError::CaseMismatch { .. })
        ));
    }

    #[test]
    fn enforce_policy_blocks_early_admin() {
        let engine = engine(EngineConfig::default().with_stage_order(StageOrderPolicy::Enforce));
        let case = award(&engine);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();

        let err = engine
            .record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("admin", StageStatus::Approved),
            )
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::OutOfOrder {
                case_id: id.to_string(),
                stage: "admin".into(),
                blocking: "advisor".into(),
            }
        );
        assert_eq!(engine.load(&id).unwrap().version, 1);
    }

    #[test]
    fn trust_policy_accepts_early_admin() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();
        let outcome = engine
            .record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("admin", StageStatus::Approved),
            )
            .unwrap();
        assert!(outcome.accepted);
    }

    #[test]
    fn undeclared_stage_in_review_is_configuration_error() {
        let engine = engine(EngineConfig::default());
        let case = award(&engine);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();
        assert!(matches!(
            engine.record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("library", StageStatus::Approved)
            ),
            Err(WorkflowError::Configuration(_))
        ));
    }

    /// Snapshot store whose first `conflicts` puts report a concurrent writer.
    struct ContendedStore {
        inner: InMemorySnapshotStore,
        conflicts: AtomicU32,
    }

    impl SnapshotStore for ContendedStore {
        fn get(&self, case_id: &CaseId) -> Result<Option<Versioned>, StoreError> {
            self.inner.get(case_id)
        }

        fn insert(&self, snapshot: CaseSnapshot) -> Result<u64, StoreError> {
            self.inner.insert(snapshot)
        }

        fn put(
            &self,
            case_id: &CaseId,
            snapshot: CaseSnapshot,
            expected_version: u64,
        ) -> Result<u64, StoreError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict {
                    expected: expected_version,
                    actual: expected_version + 1,
                });
            }
            self.inner.put(case_id, snapshot, expected_version)
        }
    }

    fn contended(conflicts: u32) -> WorkflowCoordinator<ContendedStore, InMemoryNotificationStore> {
        let workflows = WorkflowConfig::standard().unwrap().compile().unwrap();
        WorkflowCoordinator::new(
            EngineConfig::default(),
            workflows,
            ContendedStore {
                inner: InMemorySnapshotStore::new(),
                conflicts: AtomicU32::new(conflicts),
            },
            InMemoryNotificationStore::new(),
        )
        .with_sequence(Arc::new(SequenceGenerator::new()))
    }

    #[test]
    fn conflicts_are_retried_within_bound() {
        let engine = contended(2);
        let case = CaseSnapshot::new(
            CaseId::new("AW20260115120000001").unwrap(),
            CaseType::Award,
            UserId::new("2023001").unwrap(),
        );
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();

        let outcome = engine
            .record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("advisor", StageStatus::Approved),
            )
            .unwrap();
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.notifications.len(), 1);
        assert_eq!(engine.notification_store().len(), 1);
        assert_eq!(engine.metrics().snapshot().conflicts_retried, 2);
    }

    #[test]
    fn exhausted_retries_surface_conflict_without_notices() {
        let engine = contended(3);
        let case = CaseSnapshot::new(
            CaseId::new("AW20260115120000001").unwrap(),
            CaseType::Award,
            UserId::new("2023001").unwrap(),
        );
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();

        let err = engine
            .record_review(
                &id,
                CaseType::Award,
                ReviewDecision::new("advisor", StageStatus::Approved),
            )
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::StorageConflict {
                case_id: id.to_string(),
                attempts: 3
            }
        );
        assert!(err.is_retryable());
        assert!(engine.notification_store().is_empty());
    }

    /// Snapshot store where another reviewer approves `stage` just before
    /// the first put lands.
    struct InterleavedStore {
        inner: InMemorySnapshotStore,
        interloper: parking_lot::Mutex<Option<&'static str>>,
    }

    impl SnapshotStore for InterleavedStore {
        fn get(&self, case_id: &CaseId) -> Result<Option<Versioned>, StoreError> {
            self.inner.get(case_id)
        }

        fn insert(&self, snapshot: CaseSnapshot) -> Result<u64, StoreError> {
            self.inner.insert(snapshot)
        }

        fn put(
            &self,
            case_id: &CaseId,
            snapshot: CaseSnapshot,
            expected_version: u64,
        ) -> Result<u64, StoreError> {
            if let Some(stage) = self.interloper.lock().take() {
                let current = self
                    .inner
                    .get(case_id)?
                    .ok_or_else(|| StoreError::NotFound(case_id.to_string()))?;
                let other = current.snapshot.with_stage(stage, StageStatus::Approved);
                let actual = self.inner.put(case_id, other, current.version)?;
                return Err(StoreError::Conflict {
                    expected: expected_version,
                    actual,
                });
            }
            self.inner.put(case_id, snapshot, expected_version)
        }
    }

    fn leave_school_case() -> CaseSnapshot {
        CaseSnapshot::new(
            CaseId::new("LS20260115120000001").unwrap(),
            CaseType::LeaveSchool,
            UserId::new("2023001").unwrap(),
        )
    }

    #[test]
    fn retried_update_keeps_concurrent_stage_decision() {
        let workflows = WorkflowConfig::standard().unwrap().compile().unwrap();
        let engine = WorkflowCoordinator::new(
            EngineConfig::default(),
            workflows,
            InterleavedStore {
                inner: InMemorySnapshotStore::new(),
                interloper: parking_lot::Mutex::new(Some("dormitory")),
            },
            InMemoryNotificationStore::new(),
        )
        .with_sequence(Arc::new(SequenceGenerator::new()));
        let case = leave_school_case();
        let id = case.case_id.clone();
        engine.create_case(case.clone()).unwrap();

        let proposed = case.with_stage("library", StageStatus::Approved);
        let outcome = engine
            .apply_update(&id, CaseType::LeaveSchool, proposed)
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.transitions[0].stage(), Some("library"));
        assert_eq!(outcome.notifications.len(), 1);
        let stored = engine.load(&id).unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.snapshot.stage_status("dormitory"), StageStatus::Approved);
        assert_eq!(stored.snapshot.stage_status("library"), StageStatus::Approved);
    }

    #[test]
    fn update_from_stale_base_keeps_later_review() {
        let engine = engine(EngineConfig::default());
        let case = leave_school_case();
        let id = case.case_id.clone();
        engine.create_case(case.clone()).unwrap();
        engine
            .record_review(
                &id,
                CaseType::LeaveSchool,
                ReviewDecision::new("dormitory", StageStatus::Approved),
            )
            .unwrap();

        let proposed = case.clone().with_stage("library", StageStatus::Approved);
        let outcome = engine
            .apply_update_from(&id, CaseType::LeaveSchool, &case, proposed)
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.notifications.len(), 1);
        let stored = engine.load(&id).unwrap().snapshot;
        assert_eq!(stored.stage_status("dormitory"), StageStatus::Approved);
        assert_eq!(stored.stage_status("library"), StageStatus::Approved);
        assert_eq!(engine.notification_store().len(), 2);
    }

    struct RejectingNotices;

    impl NotificationStore for RejectingNotices {
        fn save(&self, _event: &NotificationEvent) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("inbox offline".into()))
        }
    }

    #[test]
    fn dispatch_failure_is_soft() {
        let workflows = WorkflowConfig::standard().unwrap().compile().unwrap();
        let engine = WorkflowCoordinator::new(
            EngineConfig::default(),
            workflows,
            InMemorySnapshotStore::new(),
            RejectingNotices,
        );
        let case = CaseSnapshot::new(
            CaseId::new("AP20260115120000001").unwrap(),
            CaseType::Appeal,
            UserId::new("2023001").unwrap(),
        )
        .with_stage("advisor", StageStatus::Approved);
        let id = case.case_id.clone();
        engine.create_case(case).unwrap();

        let outcome = engine
            .record_review(
                &id,
                CaseType::Appeal,
                ReviewDecision::new("admin", StageStatus::Rejected),
            )
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.notifications.len(), 2);
        assert_eq!(outcome.dispatch_failures.len(), 2);
        assert_eq!(
            outcome.dispatch_error(),
            Some(WorkflowError::PartialDispatchFailure {
                case_id: id.to_string(),
                failed: 2,
                total: 2,
            })
        );
        let stored = engine.load(&id).unwrap();
        assert_eq!(stored.snapshot.overall, OverallStatus::Rejected);
        assert_eq!(engine.metrics().snapshot().dispatch_failures, 2);
    }
}
