//! # Validate Subcommand
//!
//! Loads a workflow configuration (a YAML file, or the built-in standard
//! workflows) and runs the same validation the engine runs at startup.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use sm_engine::CompiledWorkflows;
use sm_state::Outcome;

use crate::{read_workflows, EXIT_INVALID, EXIT_OK};

/// Arguments for `smctl validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Workflow configuration file. Defaults to the built-in workflows.
    #[arg(value_name = "CONFIG")]
    pub path: Option<PathBuf>,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let source = args
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in workflows".to_string());

    let compiled = match read_workflows(args.path.as_deref())?.and_then(|c| c.compile()) {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("FAIL: {source}: {e}");
            return Ok(EXIT_INVALID);
        }
    };

    println!("OK: {source}");
    for line in summary(&compiled) {
        println!("  {line}");
    }
    Ok(EXIT_OK)
}

/// One line per case type: rule, stages, and notifying scopes.
pub fn summary(compiled: &CompiledWorkflows) -> Vec<String> {
    let mut lines = Vec::new();
    for case_type in compiled.model.case_types() {
        let (Ok(workflow), Ok(policy)) = (
            compiled.model.workflow(case_type),
            compiled.catalog.policy(case_type),
        ) else {
            continue;
        };
        let stages: Vec<&str> = workflow.stage_names().collect();
        let silent: Vec<String> = workflow
            .stage_names()
            .chain(std::iter::once(sm_state::OVERALL_SCOPE))
            .flat_map(|scope| {
                [Outcome::Approved, Outcome::Rejected]
                    .into_iter()
                    .filter(move |o| policy.template(scope, *o).is_none())
                    .map(move |o| format!("{scope}/{o}"))
            })
            .collect();
        let mut line = format!(
            "{case_type}: {:?} [{}], {} template(s), category {}",
            workflow.rule,
            stages.join(", "),
            policy.template_count(),
            policy.category,
        );
        if !silent.is_empty() {
            line.push_str(&format!(", silent: {}", silent.join(" ")));
        }
        lines.push(line);
    }
    lines
}
