//! # Message Templates
//!
//! Notice wording is configuration. Each case type carries a
//! [`NoticePolicy`]: a category, a priority, and a list of templates keyed
//! by scope (a stage name or `overall`) and outcome (`approved` /
//! `rejected`). The composer looks templates up; it never branches on case
//! type.
//!
//! A scope with no template for an outcome is silent: the transition is
//! still detected but produces no notice. A template for a scope the
//! workflow does not declare is a configuration error, raised when the
//! catalog is built.
//!
//! ## Placeholders
//!
//! `{name}` in a title or body is replaced by the named variable. Variables
//! the composer supplies: `case_id`, `case_type`, `subject`, `stage`,
//! `stage_label`, `reviewer_role`, `status`, `outcome`. Any other name is
//! looked up among the snapshot payload's top-level fields. Unresolved
//! placeholders are left as written.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sm_core::ConfigError;
use sm_state::{CaseType, Outcome, StageModel, OVERALL_SCOPE};

use crate::event::Priority;

// ─── Configuration Shapes ────────────────────────────────────────────

/// One template entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRule {
    /// Stage name, or `overall`.
    pub scope: String,
    pub outcome: Outcome,
    pub title: String,
    pub body: String,
}

/// Notice settings of one case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePolicy {
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub templates: Vec<TemplateRule>,
}

// ─── Compiled Catalog ────────────────────────────────────────────────

/// A title/body pair ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
}

/// Validated templates of one case type.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub category: String,
    pub priority: Priority,
    templates: HashMap<(String, Outcome), MessageTemplate>,
}

impl CompiledPolicy {
    /// The template for a scope key and outcome, if one is configured.
    pub fn template(&self, scope: &str, outcome: Outcome) -> Option<&MessageTemplate> {
        self.templates.get(&(scope.to_string(), outcome))
    }

    /// Number of configured templates.
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

/// Every case type's compiled notice policy.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    policies: HashMap<CaseType, CompiledPolicy>,
}

impl TemplateCatalog {
    /// Build the catalog, validating every scope against `model`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownCaseType`] for a policy whose case type has no
    ///   workflow, or a workflow with no policy.
    /// - [`ConfigError::UnknownTemplateScope`] for a template naming an
    ///   undeclared stage.
    /// - [`ConfigError::DuplicateCaseType`] / [`ConfigError::InvalidValue`]
    ///   for repeated case types or repeated `(scope, outcome)` keys.
    pub fn new(
        model: &StageModel,
        policies: impl IntoIterator<Item = (CaseType, NoticePolicy)>,
    ) -> Result<Self, ConfigError> {
        let mut compiled = HashMap::new();
        for (case_type, policy) in policies {
            let workflow = model.workflow(case_type)?;
            let mut templates = HashMap::new();
            for rule in policy.templates {
                if rule.scope != OVERALL_SCOPE && workflow.stage(&rule.scope).is_none() {
                    return Err(ConfigError::UnknownTemplateScope {
                        case_type: case_type.to_string(),
                        scope: rule.scope,
                    });
                }
                let key = (rule.scope, rule.outcome);
                if templates.contains_key(&key) {
                    return Err(ConfigError::InvalidValue {
                        key: format!("{case_type}.templates"),
                        value: format!("{}/{}", key.0, key.1),
                        reason: "template declared more than once".to_string(),
                    });
                }
                templates.insert(
                    key,
                    MessageTemplate {
                        title: rule.title,
                        body: rule.body,
                    },
                );
            }
            let entry = CompiledPolicy {
                category: policy.category,
                priority: policy.priority,
                templates,
            };
            if compiled.insert(case_type, entry).is_some() {
                return Err(ConfigError::DuplicateCaseType(case_type.to_string()));
            }
        }

        for case_type in model.case_types() {
            if !compiled.contains_key(&case_type) {
                return Err(ConfigError::UnknownCaseType(format!(
                    "{case_type} (no notice policy)"
                )));
            }
        }

        Ok(Self { policies: compiled })
    }

    /// The compiled policy of a case type.
    pub fn policy(&self, case_type: CaseType) -> Result<&CompiledPolicy, ConfigError> {
        self.policies
            .get(&case_type)
            .ok_or_else(|| ConfigError::UnknownCaseType(case_type.to_string()))
    }
}

// ─── Rendering ───────────────────────────────────────────────────────

/// Substitute `{name}` placeholders using `lookup`.
pub fn render(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open.find('}');
        match close {
            Some(close) if is_placeholder_name(&after_open[..close]) => {
                let name = &after_open[..close];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        tracing::debug!(placeholder = name, "unresolved template placeholder");
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_state::{CaseWorkflow, CombinationRule, StageDef};

    fn model() -> StageModel {
        StageModel::new(vec![CaseWorkflow::new(
            CaseType::Award,
            CombinationRule::Sequential,
            vec![
                StageDef::new("advisor", "advisor review", "advisor"),
                StageDef::new("admin", "academic affairs review", "academic affairs office"),
            ],
        )])
        .unwrap()
    }

    fn rule(scope: &str, outcome: Outcome) -> TemplateRule {
        TemplateRule {
            scope: scope.into(),
            outcome,
            title: "t".into(),
            body: "b".into(),
        }
    }

    fn policy(templates: Vec<TemplateRule>) -> NoticePolicy {
        NoticePolicy {
            category: "award_review".into(),
            priority: Priority::Important,
            templates,
        }
    }

    #[test]
    fn render_substitutes_known_names() {
        let out = render("Award \"{award_name}\" was {status} by the {reviewer_role}.", |k| {
            match k {
                "award_name" => Some("Merit Scholarship".into()),
                "status" => Some("approved".into()),
                "reviewer_role" => Some("advisor".into()),
                _ => None,
            }
        });
        assert_eq!(out, "Award \"Merit Scholarship\" was approved by the advisor.");
    }

    #[test]
    fn render_keeps_unknown_and_malformed_braces() {
        let out = render("{missing} {not a name} {", |_| None);
        assert_eq!(out, "{missing} {not a name} {");
        assert_eq!(render("no placeholders", |_| None), "no placeholders");
    }

    #[test]
    fn catalog_lookup() {
        let catalog = TemplateCatalog::new(
            &model(),
            vec![(
                CaseType::Award,
                policy(vec![
                    rule("advisor", Outcome::Approved),
                    rule("overall", Outcome::Rejected),
                ]),
            )],
        )
        .unwrap();
        let p = catalog.policy(CaseType::Award).unwrap();
        assert!(p.template("advisor", Outcome::Approved).is_some());
        assert!(p.template("advisor", Outcome::Rejected).is_none());
        assert!(p.template("overall", Outcome::Rejected).is_some());
        assert_eq!(p.template_count(), 2);
    }

    #[test]
    fn undeclared_scope_fails_at_build() {
        let err = TemplateCatalog::new(
            &model(),
            vec![(CaseType::Award, policy(vec![rule("library", Outcome::Approved)]))],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownTemplateScope {
                case_type: "award".into(),
                scope: "library".into()
            }
        );
    }

    #[test]
    fn policy_without_workflow_fails() {
        let err = TemplateCatalog::new(&model(), vec![(CaseType::Appeal, policy(vec![]))])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCaseType(_)));
    }

    #[test]
    fn workflow_without_policy_fails() {
        let err = TemplateCatalog::new(&model(), Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCaseType(_)));
    }

    #[test]
    fn duplicate_template_key_fails() {
        let err = TemplateCatalog::new(
            &model(),
            vec![(
                CaseType::Award,
                policy(vec![
                    rule("admin", Outcome::Approved),
                    rule("admin", Outcome::Approved),
                ]),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
