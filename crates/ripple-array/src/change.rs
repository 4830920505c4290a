#![forbid(unsafe_code)]

//! Change records delivered to listeners and interceptors.
//!
//! Listeners receive an [`ArrayChange`] after a change has been applied;
//! interceptors receive an [`ArrayWillChange`] before, and may rewrite or
//! cancel it. Records are only produced for non-empty deltas.

use crate::array::ObservableArray;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Update,
    Splice,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Splice => "splice",
        }
    }
}

/// A single slot was replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayUpdate {
    pub source: ObservableArray,
    pub index: usize,
    pub old_value: Value,
    pub new_value: Value,
}

/// A contiguous run was removed and another inserted at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySplice {
    pub source: ObservableArray,
    pub index: usize,
    pub removed: Vec<Value>,
    pub added: Vec<Value>,
    pub added_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayChange {
    Update(ArrayUpdate),
    Splice(ArraySplice),
}

impl ArrayChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Update(_) => ChangeKind::Update,
            Self::Splice(_) => ChangeKind::Splice,
        }
    }

    #[must_use]
    pub fn source(&self) -> &ObservableArray {
        match self {
            Self::Update(u) => &u.source,
            Self::Splice(s) => &s.source,
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Update(u) => u.index,
            Self::Splice(s) => s.index,
        }
    }

    #[must_use]
    pub fn as_splice(&self) -> Option<&ArraySplice> {
        match self {
            Self::Splice(s) => Some(s),
            Self::Update(_) => None,
        }
    }

    #[must_use]
    pub fn as_update(&self) -> Option<&ArrayUpdate> {
        match self {
            Self::Update(u) => Some(u),
            Self::Splice(_) => None,
        }
    }
}

/// A proposed change, seen by interceptors before wrapping.
///
/// Interceptors may rewrite the payload but not the kind; returning the
/// other kind cancels the change.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayWillChange {
    Update {
        index: usize,
        new_value: Value,
    },
    Splice {
        index: usize,
        removed_count: usize,
        added: Vec<Value>,
    },
}

impl ArrayWillChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Update { .. } => ChangeKind::Update,
            Self::Splice { .. } => ChangeKind::Splice,
        }
    }
}
