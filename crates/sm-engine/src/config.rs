//! # Engine Configuration
//!
//! Two layers:
//!
//! - [`EngineConfig`]: coordinator knobs, from defaults and environment.
//! - [`WorkflowConfig`]: the table describing every case type (stages,
//!   combination rule, labels, notice templates), loaded from YAML.
//!
//! Workflow configuration is validated once at startup by
//! [`WorkflowConfig::compile`]; a configuration that compiles never yields
//! a configuration error for the stages and scopes it declares.
//!
//! ## Environment
//!
//! - `SM_MAX_UPDATE_ATTEMPTS` (default 3, minimum 1)
//! - `SM_STAGE_ORDER_POLICY` (`trust` | `enforce`, default `trust`)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sm_core::ConfigError;
use sm_notify::{NoticePolicy, NotificationComposer, TemplateCatalog};
use sm_state::{CaseWorkflow, StageModel};

/// Environment variable overriding [`EngineConfig::max_update_attempts`].
pub const ENV_MAX_UPDATE_ATTEMPTS: &str = "SM_MAX_UPDATE_ATTEMPTS";

/// Environment variable overriding [`EngineConfig::stage_order`].
pub const ENV_STAGE_ORDER_POLICY: &str = "SM_STAGE_ORDER_POLICY";

/// Default number of load-diff-persist attempts per update.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 3;

const STANDARD_WORKFLOWS: &str = include_str!("../config/workflows.yaml");

// ─── Engine Config ───────────────────────────────────────────────────

/// Whether sequential stage order is checked on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOrderPolicy {
    /// Accept any stage map; only derive the overall status.
    #[default]
    Trust,
    /// Reject a sequential update in which a later stage left `Pending`
    /// before every earlier stage was approved.
    Enforce,
}

impl std::str::FromStr for StageOrderPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trust" => Ok(Self::Trust),
            "enforce" => Ok(Self::Enforce),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_STAGE_ORDER_POLICY.to_string(),
                value: s.to_string(),
                reason: "expected \"trust\" or \"enforce\"".to_string(),
            }),
        }
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts before a storage conflict is surfaced. At least 1.
    pub max_update_attempts: u32,
    pub stage_order: StageOrderPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
            stage_order: StageOrderPolicy::Trust,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`. Unset keys keep their default;
    /// set but invalid values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_UPDATE_ATTEMPTS) {
            let attempts: u32 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_UPDATE_ATTEMPTS.to_string(),
                value: raw.clone(),
                reason: "expected a positive integer".to_string(),
            })?;
            config = config.with_max_update_attempts(attempts)?;
        }
        if let Some(raw) = lookup(ENV_STAGE_ORDER_POLICY) {
            config.stage_order = raw.parse()?;
        }
        Ok(config)
    }

    /// Builder: set the attempt bound.
    pub fn with_max_update_attempts(mut self, attempts: u32) -> Result<Self, ConfigError> {
        if attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MAX_UPDATE_ATTEMPTS.to_string(),
                value: attempts.to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        self.max_update_attempts = attempts;
        Ok(self)
    }

    /// Builder: set the ordering policy.
    pub fn with_stage_order(mut self, policy: StageOrderPolicy) -> Self {
        self.stage_order = policy;
        self
    }
}

// ─── Workflow Config ─────────────────────────────────────────────────

/// One case type as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    #[serde(flatten)]
    pub workflow: CaseWorkflow,
    pub notice: NoticePolicy,
}

/// The table of every case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflows: Vec<WorkflowEntry>,
}

/// Validated, shareable workflow tables.
#[derive(Debug, Clone)]
pub struct CompiledWorkflows {
    pub model: Arc<StageModel>,
    pub catalog: Arc<TemplateCatalog>,
}

impl CompiledWorkflows {
    /// A composer over these tables.
    pub fn composer(&self) -> NotificationComposer {
        NotificationComposer::new(Arc::clone(&self.model), Arc::clone(&self.catalog))
    }
}

impl WorkflowConfig {
    /// The five built-in student-affairs workflows.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::from_yaml(STANDARD_WORKFLOWS)
    }

    /// Parse a YAML document. Does not validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Startup validation without keeping the result.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    /// Validate and build the stage model and template catalog.
    ///
    /// # Errors
    ///
    /// Empty or duplicate stages, duplicate case types, malformed id
    /// prefixes, and templates for undeclared scopes.
    pub fn compile(&self) -> Result<CompiledWorkflows, ConfigError> {
        for entry in &self.workflows {
            let prefix = &entry.workflow.id_prefix;
            if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}.id_prefix", entry.workflow.case_type),
                    value: prefix.clone(),
                    reason: "id prefix must be ASCII alphanumeric".to_string(),
                });
            }
        }
        let model = StageModel::new(self.workflows.iter().map(|e| e.workflow.clone()))?;
        let catalog = TemplateCatalog::new(
            &model,
            self.workflows
                .iter()
                .map(|e| (e.workflow.case_type, e.notice.clone())),
        )?;
        tracing::debug!(case_types = model.len(), "workflow configuration compiled");
        Ok(CompiledWorkflows {
            model: Arc::new(model),
            catalog: Arc::new(catalog),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_state::{CaseType, CombinationRule, Outcome, StageStatus};
    use std::collections::HashMap;

    #[test]
    fn standard_workflows_compile() {
        let config = WorkflowConfig::standard().unwrap();
        let compiled = config.compile().unwrap();
        assert_eq!(compiled.model.case_types(), CaseType::ALL.to_vec());

        let leave = compiled.model.workflow(CaseType::LeaveSchool).unwrap();
        assert_eq!(leave.rule, CombinationRule::ParallelAnd);
        assert_eq!(
            leave.stage_names().collect::<Vec<_>>(),
            vec!["dormitory", "library", "finance", "admin"]
        );
        assert_eq!(leave.id_prefix, "LS");
        assert_eq!(leave.stage_labels.label(StageStatus::Approved), "cleared");
    }

    #[test]
    fn punishment_notifies_on_overall_only() {
        let compiled = WorkflowConfig::standard().unwrap().compile().unwrap();
        let policy = compiled.catalog.policy(CaseType::Punishment).unwrap();
        assert!(policy.template("admin", Outcome::Approved).is_none());
        assert!(policy.template("overall", Outcome::Approved).is_some());
        assert!(policy.template("overall", Outcome::Rejected).is_some());
    }

    #[test]
    fn unknown_template_scope_fails_compile() {
        let yaml = r#"
workflows:
  - case_type: award
    rule: sequential
    stages:
      - { name: advisor, label: advisor review, reviewer_role: advisor }
    notice:
      category: award_review
      templates:
        - { scope: library, outcome: approved, title: t, body: b }
"#;
        let config = WorkflowConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownTemplateScope { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        assert!(matches!(
            WorkflowConfig::from_yaml("workflows: [ { case_type: award"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            WorkflowConfig::from_yaml("workflows:\n  - case_type: scholarship\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn bad_prefix_rejected() {
        let mut config = WorkflowConfig::standard().unwrap();
        config.workflows[0].workflow.id_prefix = "A-W".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_update_attempts, 3);
        assert_eq!(config.stage_order, StageOrderPolicy::Trust);
    }

    #[test]
    fn engine_config_overrides() {
        let config = EngineConfig::from_lookup(env(&[
            (ENV_MAX_UPDATE_ATTEMPTS, "5"),
            (ENV_STAGE_ORDER_POLICY, "Enforce"),
        ]))
        .unwrap();
        assert_eq!(config.max_update_attempts, 5);
        assert_eq!(config.stage_order, StageOrderPolicy::Enforce);
    }

    #[test]
    fn engine_config_rejects_invalid_values() {
        for (key, value) in [
            (ENV_MAX_UPDATE_ATTEMPTS, "0"),
            (ENV_MAX_UPDATE_ATTEMPTS, "three"),
            (ENV_STAGE_ORDER_POLICY, "strict"),
        ] {
            let err = EngineConfig::from_lookup(env(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { .. }),
                "{key}={value} gave {err:?}"
            );
        }
    }
}
