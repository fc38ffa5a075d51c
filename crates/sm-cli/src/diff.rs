//! # Diff Subcommand
//!
//! Dry run of one update: reads a `before` and an `after` snapshot as JSON,
//! runs the transition detector and the notification composer, and prints
//! the transitions and notices the coordinator would emit. Nothing is
//! stored and no notice ids are assigned.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sm_core::{Timestamp, WorkflowError};
use sm_engine::CompiledWorkflows;
use sm_notify::NotificationEvent;
use sm_state::{CaseSnapshot, CaseType, OverallStatus, Transition};

use crate::{read_workflows, EXIT_INVALID, EXIT_OK};

/// Arguments for `smctl diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Case type both snapshots belong to (e.g. `award`, `leave-school`).
    #[arg(long)]
    pub case_type: CaseType,

    /// Snapshot before the update (JSON).
    #[arg(long, value_name = "FILE")]
    pub before: PathBuf,

    /// Proposed snapshot after the update (JSON).
    #[arg(long, value_name = "FILE")]
    pub after: PathBuf,

    /// Workflow configuration file. Defaults to the built-in workflows.
    #[arg(long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// What an update from `before` to `after` would emit.
#[derive(Debug, Serialize)]
pub struct DiffReport {
    /// Overall status derived from the `after` stage map.
    pub overall: OverallStatus,
    pub transitions: Vec<Transition>,
    pub notifications: Vec<NotificationEvent>,
}

/// Execute the diff subcommand.
pub fn run_diff(args: &DiffArgs) -> Result<u8> {
    let before = read_snapshot(&args.before)?;
    let after = read_snapshot(&args.after)?;

    let compiled = match read_workflows(args.config.as_deref())?.and_then(|c| c.compile()) {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("FAIL: workflow configuration: {e}");
            return Ok(EXIT_INVALID);
        }
    };

    match diff_report(&compiled, args.case_type, &before, &after, Timestamp::now()) {
        Ok(report) => {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{json}");
            Ok(EXIT_OK)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(EXIT_INVALID)
        }
    }
}

/// Detect and compose without touching any store.
pub fn diff_report(
    compiled: &CompiledWorkflows,
    case_type: CaseType,
    before: &CaseSnapshot,
    after: &CaseSnapshot,
    now: Timestamp,
) -> Result<DiffReport, WorkflowError> {
    for snapshot in [before, after] {
        if snapshot.case_type != case_type {
            return Err(WorkflowError::CaseMismatch {
                expected: case_type.to_string(),
                actual: snapshot.case_type.to_string(),
            });
        }
    }
    let transitions = compiled.model.diff(Some(before), after)?;
    let overall = compiled.model.combine(case_type, &after.status_map())?;
    let notifications = compiled.composer().compose_all(&transitions, after, now)?;
    Ok(DiffReport {
        overall,
        transitions,
        notifications,
    })
}

fn read_snapshot(path: &Path) -> Result<CaseSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid snapshot in {}", path.display()))
}
