//! # Workflow Laws
//!
//! Property tests over the standard workflows:
//!
//! - combination: `Approved` iff every stage approved, `Rejected` iff any
//!   stage rejected, for sequential and parallel workflows alike
//! - detection: no transitions on creation or on identical snapshots
//! - composition: a transition into `Pending` or `InProgress` never notifies
//! - coordination: one notice per terminal transition, never more

use std::sync::Arc;

use proptest::prelude::*;
use sm_core::{CaseId, SequenceGenerator, Timestamp, UserId};
use sm_engine::{
    CompiledWorkflows, EngineConfig, InMemoryNotificationStore, InMemorySnapshotStore,
    WorkflowConfig, WorkflowCoordinator,
};
use sm_state::{CaseSnapshot, CaseType, OverallStatus, StageStatus};

fn compiled() -> CompiledWorkflows {
    WorkflowConfig::standard().unwrap().compile().unwrap()
}

fn case_type() -> impl Strategy<Value = CaseType> {
    prop::sample::select(CaseType::ALL.to_vec())
}

fn stage_status() -> impl Strategy<Value = StageStatus> {
    prop_oneof![
        Just(StageStatus::Pending),
        Just(StageStatus::Approved),
        Just(StageStatus::Rejected),
    ]
}

/// A snapshot of `case_type` whose stages get `statuses` in declared order.
/// `None` leaves a stage out, which reads as pending.
fn snapshot(
    compiled: &CompiledWorkflows,
    case_type: CaseType,
    statuses: &[Option<StageStatus>],
) -> CaseSnapshot {
    let workflow = compiled.model.workflow(case_type).unwrap();
    let mut snap = CaseSnapshot::new(
        CaseId::new(format!("{}20260115120000001", workflow.id_prefix)).unwrap(),
        case_type,
        UserId::new("2023001").unwrap(),
    );
    for (name, status) in workflow.stage_names().zip(statuses) {
        if let Some(status) = status {
            snap = snap.with_stage(name, *status);
        }
    }
    snap
}

fn slots() -> impl Strategy<Value = Vec<Option<StageStatus>>> {
    prop::collection::vec(prop::option::of(stage_status()), 4)
}

proptest! {
    /// Approved iff all stages approved; Rejected iff any stage rejected.
    #[test]
    fn combination_law(case_type in case_type(), statuses in slots()) {
        let compiled = compiled();
        let snap = snapshot(&compiled, case_type, &statuses);
        let workflow = compiled.model.workflow(case_type).unwrap();
        let overall = compiled.model.combine(case_type, &snap.status_map()).unwrap();

        let all_approved = workflow
            .stage_names()
            .all(|s| snap.stage_status(s) == StageStatus::Approved);
        let any_rejected = workflow
            .stage_names()
            .any(|s| snap.stage_status(s) == StageStatus::Rejected);
        prop_assert_eq!(overall == OverallStatus::Approved, all_approved);
        prop_assert_eq!(overall == OverallStatus::Rejected, any_rejected);
    }

    /// Diffing against an absent `before`, or against itself, is empty.
    #[test]
    fn creation_and_restatement_are_silent(case_type in case_type(), statuses in slots()) {
        let compiled = compiled();
        let snap = snapshot(&compiled, case_type, &statuses);
        prop_assert!(compiled.model.diff(None, &snap).unwrap().is_empty());
        prop_assert!(compiled.model.diff(Some(&snap), &snap).unwrap().is_empty());
    }

    /// Transitions into a non-terminal status never produce a notice, and
    /// terminal stage transitions produce at most one.
    #[test]
    fn only_terminal_transitions_notify(
        case_type in case_type(),
        before in slots(),
        after in slots(),
    ) {
        let compiled = compiled();
        let before = snapshot(&compiled, case_type, &before);
        let after = snapshot(&compiled, case_type, &after);
        let composer = compiled.composer();

        let transitions = compiled.model.diff(Some(&before), &after).unwrap();
        for t in &transitions {
            let notice = composer.compose_at(t, &after, Timestamp::now()).unwrap();
            if t.outcome().is_none() {
                prop_assert!(notice.is_none(), "{} notified", t);
            }
        }
        let notices = composer
            .compose_all(&transitions, &after, Timestamp::now())
            .unwrap();
        prop_assert!(notices.len() <= transitions.len());
        prop_assert!(notices.iter().all(|n| n.recipient == after.subject));
    }

    /// Through the coordinator: stored notices equal composed notices, and
    /// reapplying the same snapshot adds none.
    #[test]
    fn coordinator_notifies_once_per_transition(
        case_type in case_type(),
        first in slots(),
        second in slots(),
    ) {
        let compiled = compiled();
        let engine = WorkflowCoordinator::new(
            EngineConfig::default(),
            compiled.clone(),
            InMemorySnapshotStore::new(),
            InMemoryNotificationStore::new(),
        )
        .with_sequence(Arc::new(SequenceGenerator::new()));

        let initial = snapshot(&compiled, case_type, &first);
        let id = initial.case_id.clone();
        engine.create_case(initial).unwrap();
        prop_assert!(engine.notification_store().is_empty());

        let proposed = snapshot(&compiled, case_type, &second);
        let outcome = engine.apply_update(&id, case_type, proposed.clone()).unwrap();
        prop_assert!(outcome.accepted);
        prop_assert_eq!(engine.notification_store().len(), outcome.notifications.len());
        let terminal = outcome
            .transitions
            .iter()
            .filter(|t| t.outcome().is_some())
            .count();
        prop_assert!(outcome.notifications.len() <= terminal);
        prop_assert!(outcome.notifications.iter().all(|n| n.notice_id.is_some()));

        let again = engine.apply_update(&id, case_type, proposed).unwrap();
        prop_assert!(again.transitions.is_empty());
        prop_assert!(again.notifications.is_empty());
        prop_assert_eq!(engine.notification_store().len(), outcome.notifications.len());
    }
}
