//! # sm-core — Foundational Types for the Review Engine
//!
//! Leaf crate of the workspace. Every other `sm-*` crate depends on it; it
//! depends on nothing internal.
//!
//! ## Contents
//!
//! 1. **Identifier newtypes.** `CaseId`, `NoticeId` and `UserId` with
//!    validated constructors. Bare strings never cross crate boundaries.
//!
//! 2. **`Timestamp`.** UTC-only, truncated to seconds. Sequence identifiers
//!    embed its compact `yyyyMMddHHmmss` rendering.
//!
//! 3. **`WorkflowError`.** The caller-facing error taxonomy: not-found,
//!    configuration, storage conflict, partial dispatch failure.
//!
//! 4. **`SequenceGenerator`.** Process-wide atomic counter producing
//!    `prefix + timestamp + NNN` identifiers for cases and notices.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod sequence;
pub mod temporal;

pub use error::{ConfigError, WorkflowError};
pub use identity::{CaseId, NoticeId, UserId};
pub use sequence::SequenceGenerator;
pub use temporal::Timestamp;
