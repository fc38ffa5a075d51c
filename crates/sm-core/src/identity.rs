//! # Identifier Newtypes
//!
//! Newtype wrappers for the identifiers the engine handles. You cannot pass
//! a `UserId` where a `CaseId` is expected.
//!
//! Identifiers are opaque strings issued either by the sequence generator
//! (cases, notices) or by the excluded account system (users). Construction
//! trims whitespace and rejects empty values.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier.
            ///
            /// Returns an error if the value is empty after trimming.
            pub fn new(value: impl Into<String>) -> Result<Self, WorkflowError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(WorkflowError::InvalidInput(format!(
                        "{} must not be empty",
                        $label
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = WorkflowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(
    /// Identifier of one case record (award, punishment, appeal, ...).
    CaseId,
    "case id"
);

string_id!(
    /// Identifier of one persisted notice.
    NoticeId,
    "notice id"
);

string_id!(
    /// Identifier of a student, advisor, or administrator account.
    UserId,
    "user id"
);

// Sequence-generated identifiers skip validation: the generator never
// yields an empty value.

impl CaseId {
    pub(crate) fn from_generated(value: String) -> Self {
        Self(value)
    }
}

impl NoticeId {
    pub(crate) fn from_generated(value: String) -> Self {
        Self(value)
    }
}
