//! # sm-cli — `smctl`
//!
//! Operator tooling around the review engine.
//!
//! ## Subcommands
//!
//! - `validate`: load a workflow configuration and run startup validation
//! - `diff`: run the transition detector and notification composer on two
//!   snapshot files and print what an update would emit
//!
//! Handlers return an exit code: 0 on success, 1 on validation failure.
//! Operational errors (unreadable files) propagate as `anyhow::Error` and
//! exit with 2.

use std::path::Path;

use anyhow::{Context, Result};
use sm_engine::WorkflowConfig;

pub mod diff;
pub mod validate;

/// Exit code for success.
pub const EXIT_OK: u8 = 0;
/// Exit code for invalid configuration or input.
pub const EXIT_INVALID: u8 = 1;
/// Exit code for operational errors.
pub const EXIT_ERROR: u8 = 2;

/// Read a workflow configuration file, or the built-in one when `path` is
/// `None`. Parse failures are returned as the inner [`sm_core::ConfigError`]
/// so callers can report them as validation failures.
pub fn read_workflows(
    path: Option<&Path>,
) -> Result<Result<WorkflowConfig, sm_core::ConfigError>> {
    match path {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(WorkflowConfig::from_yaml(&yaml))
        }
        None => Ok(WorkflowConfig::standard()),
    }
}
