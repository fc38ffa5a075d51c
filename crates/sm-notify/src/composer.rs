//! # Notification Composer
//!
//! Maps a detected [`Transition`] to zero or one [`NotificationEvent`].
//!
//! ## Policy
//!
//! - A transition notifies only when its new status is terminal. Moving
//!   into `Pending` or `InProgress` never notifies.
//! - The recipient is always the case subject.
//! - Stage notices carry the stage's reviewer as source actor; overall
//!   notices carry the literal `system`.
//! - Wording comes from the [`TemplateCatalog`]; a terminal transition on a
//!   scope with no template is silent.
//!
//! The composer holds no per-call state and never branches on case type.

use std::sync::Arc;

use sm_core::{Timestamp, WorkflowError};
use sm_state::{CaseSnapshot, CaseWorkflow, Change, StageModel, Transition};

use crate::event::{NotificationEvent, SourceActor};
use crate::template::{render, TemplateCatalog};

/// Builds notices from transitions.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    model: Arc<StageModel>,
    catalog: Arc<TemplateCatalog>,
}

impl NotificationComposer {
    pub fn new(model: Arc<StageModel>, catalog: Arc<TemplateCatalog>) -> Self {
        Self { model, catalog }
    }

    /// The stage model this composer resolves workflows from.
    pub fn model(&self) -> &Arc<StageModel> {
        &self.model
    }

    /// `Compose(caseType, transition, after)`, stamped with the current time.
    pub fn compose(
        &self,
        transition: &Transition,
        after: &CaseSnapshot,
    ) -> Result<Option<NotificationEvent>, WorkflowError> {
        self.compose_at(transition, after, Timestamp::now())
    }

    /// [`compose`](Self::compose) with a caller-supplied creation time.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::CaseMismatch`] if `after` is not the case the
    /// transition belongs to; [`WorkflowError::Configuration`] if the case
    /// type or stage is not declared.
    pub fn compose_at(
        &self,
        transition: &Transition,
        after: &CaseSnapshot,
        created_at: Timestamp,
    ) -> Result<Option<NotificationEvent>, WorkflowError> {
        if transition.case_id != after.case_id {
            return Err(WorkflowError::CaseMismatch {
                expected: transition.case_id.to_string(),
                actual: after.case_id.to_string(),
            });
        }
        let workflow = self.model.workflow(transition.case_type)?;
        let policy = self.catalog.policy(transition.case_type)?;

        let Some(outcome) = transition.outcome() else {
            return Ok(None);
        };
        let scope = transition.scope();
        let Some(template) = policy.template(scope.key(), outcome) else {
            tracing::debug!(
                case_id = %transition.case_id,
                case_type = %transition.case_type,
                scope = %scope,
                %outcome,
                "no template for scope, notice suppressed"
            );
            return Ok(None);
        };

        let vars = Variables::resolve(workflow, transition, after)?;
        let lookup = |name: &str| vars.get(name, after);

        let source = match &transition.change {
            Change::Stage { stage, .. } => SourceActor::Reviewer {
                role: workflow.require_stage(stage)?.reviewer_role.clone(),
                reviewer_id: after.stage(stage).and_then(|e| e.reviewer_id.clone()),
            },
            Change::Overall { .. } => SourceActor::System,
        };

        Ok(Some(NotificationEvent {
            notice_id: None,
            case_id: transition.case_id.clone(),
            case_type: transition.case_type,
            scope,
            recipient: after.subject.clone(),
            title: render(&template.title, lookup),
            body: render(&template.body, lookup),
            category: policy.category.clone(),
            priority: policy.priority,
            source,
            created_at,
        }))
    }

    /// Compose every transition in order, keeping the non-silent ones.
    pub fn compose_all(
        &self,
        transitions: &[Transition],
        after: &CaseSnapshot,
        created_at: Timestamp,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        let mut events = Vec::with_capacity(transitions.len());
        for transition in transitions {
            if let Some(event) = self.compose_at(transition, after, created_at)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

// ─── Template Variables ──────────────────────────────────────────────

struct Variables {
    case_id: String,
    case_type: String,
    subject: String,
    stage: String,
    stage_label: String,
    reviewer_role: String,
    status: String,
    outcome: String,
}

impl Variables {
    fn resolve(
        workflow: &CaseWorkflow,
        transition: &Transition,
        after: &CaseSnapshot,
    ) -> Result<Self, WorkflowError> {
        let (stage, stage_label, reviewer_role, status) = match &transition.change {
            Change::Stage { stage, to, .. } => {
                let def = workflow.require_stage(stage)?;
                (
                    def.name.clone(),
                    def.label.clone(),
                    def.reviewer_role.clone(),
                    workflow.stage_labels.label(*to).to_string(),
                )
            }
            Change::Overall { to, .. } => (
                String::new(),
                String::new(),
                String::new(),
                workflow.overall_labels.label(*to).to_string(),
            ),
        };
        Ok(Self {
            case_id: transition.case_id.to_string(),
            case_type: transition.case_type.to_string(),
            subject: after.subject.to_string(),
            stage,
            stage_label,
            reviewer_role,
            status,
            outcome: transition
                .outcome()
                .map(|o| o.to_string())
                .unwrap_or_default(),
        })
    }

    fn get(&self, name: &str, after: &CaseSnapshot) -> Option<String> {
        let value = match name {
            "case_id" => &self.case_id,
            "case_type" => &self.case_type,
            "subject" => &self.subject,
            "stage" => &self.stage,
            "stage_label" => &self.stage_label,
            "reviewer_role" => &self.reviewer_role,
            "status" => &self.status,
            "outcome" => &self.outcome,
            other => return after.payload_text(other),
        };
        Some(value.clone())
    }
}
