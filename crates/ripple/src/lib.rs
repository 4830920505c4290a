#![forbid(unsafe_code)]

//! Ripple public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users: the
//! [`observable`] declaration, the mode modifiers and a prelude.

use std::rc::Rc;

use ripple_array::{ArrayOptions, ObservableArray, Value, WrapMode};
use ripple_core::{Result, Runtime, UsageError};

pub use ripple_array;
pub use ripple_core;

pub mod prelude {
    pub use crate::{as_flat, as_reference, as_structure, observable, observable_named};
    pub use ripple_array::{
        ArrayChange, ArrayOptions, ArrayWillChange, ChangeKind, ObservableArray, Value, WrapMode,
    };
    pub use ripple_core::{Computed, Reaction, Runtime, RuntimeConfig, Subscription, UsageError};
}

/// Mark `value` so that [`observable`] stores its elements as opaque
/// references.
pub fn as_reference(value: impl Into<Value>) -> Value {
    Value::as_reference(value)
}

/// Mark `value` so that [`observable`] makes the array, but not its
/// elements, reactive.
pub fn as_flat(value: impl Into<Value>) -> Value {
    Value::as_flat(value)
}

/// Mark `value` so that [`observable`] compares its elements structurally.
pub fn as_structure(value: impl Into<Value>) -> Value {
    Value::as_structure(value)
}

/// Declare an observable array from a plain list.
///
/// An unmarked list becomes a recursive array. A list wrapped in one of the
/// modifiers ([`as_reference`], [`as_flat`], [`as_structure`]) uses that
/// mode instead. An existing array is returned as-is. Anything else is
/// rejected with [`UsageError::NotASequence`].
pub fn observable(runtime: &Runtime, value: impl Into<Value>) -> Result<ObservableArray> {
    declare(runtime, value.into(), ArrayOptions::new())
}

/// [`observable`] with an explicit diagnostic name.
pub fn observable_named(
    runtime: &Runtime,
    name: impl Into<String>,
    value: impl Into<Value>,
) -> Result<ObservableArray> {
    declare(runtime, value.into(), ArrayOptions::new().named(name))
}

fn declare(runtime: &Runtime, value: Value, options: ArrayOptions) -> Result<ObservableArray> {
    let (requested, inner) = match value {
        Value::Modified(modifier) => (Some(modifier.mode), modifier.value.clone()),
        other => (None, other),
    };
    let mode = requested.unwrap_or(WrapMode::Recursive);
    match inner {
        Value::List(items) => {
            let items = Rc::try_unwrap(items).unwrap_or_else(|shared| (*shared).clone());
            ObservableArray::with_options(runtime, items, options.with_mode(mode))
        }
        Value::Array(array) if requested.is_none_or(|m| m == array.mode()) => Ok(array),
        Value::Array(array) => {
            ObservableArray::with_options(runtime, array.to_vec(), options.with_mode(mode))
        }
        other => Err(UsageError::NotASequence {
            found: other.type_name(),
        }),
    }
}
