#![forbid(unsafe_code)]

//! Usage errors raised by reactive containers.
//!
//! Every variant is a programming mistake on the caller's side. None of them
//! are transient, so nothing in Ripple retries on them; they surface to the
//! caller synchronously and leave the container untouched.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UsageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("invalid length {value}: length must be a non-negative whole number")]
    InvalidLength { value: i64 },

    #[error("index out of bounds: {index} is larger than {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    #[error("modifiers can only be used for the initial declaration of a reactive value")]
    ModifierNotAllowed,

    #[error(
        "internal structure of {name} was changed outside of splice \
         (expected length {expected}, found {actual})"
    )]
    StructureCorrupted {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot declare an observable array from {found}")]
    NotASequence { found: &'static str },

    #[error("state of {name} may not be modified here (inside a derivation or outside an action)")]
    ModificationNotAllowed { name: String },
}

impl UsageError {
    #[must_use]
    pub fn not_allowed(name: impl Into<String>) -> Self {
        Self::ModificationNotAllowed { name: name.into() }
    }

    #[must_use]
    pub fn corrupted(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::StructureCorrupted {
            name: name.into(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_offending_index() {
        let err = UsageError::IndexOutOfBounds {
            index: 5,
            length: 3,
        };
        assert_eq!(err.to_string(), "index out of bounds: 5 is larger than 3");
    }

    #[test]
    fn not_a_sequence_names_the_offending_type() {
        let err = UsageError::NotASequence { found: "number" };
        assert_eq!(
            err.to_string(),
            "cannot declare an observable array from number"
        );
    }

    #[test]
    fn corrupted_reports_both_lengths() {
        let msg = UsageError::corrupted("todos", 3, 4).to_string();
        assert!(msg.contains("todos"));
        assert!(msg.contains("expected length 3"));
        assert!(msg.contains("found 4"));
    }
}
