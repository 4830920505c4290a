#![forbid(unsafe_code)]

//! Wrap modes: how inserted values are stored and compared.
//!
//! The mode is picked once, when a container is created. Each variant has a
//! zero-sized [`Enhancer`] implementing its two behaviours:
//!
//! | Mode        | Stored as                         | Compared by |
//! |-------------|-----------------------------------|-------------|
//! | `Reference` | as-is                             | identity    |
//! | `Flat`      | as-is                             | identity    |
//! | `Structure` | as-is                             | structure   |
//! | `Recursive` | plain lists become reactive, deep | structure   |
//!
//! Every enhancer rejects modifier-marked values.

use std::rc::Rc;

use ripple_core::{Result, Runtime, UsageError};

use crate::array::{ArrayOptions, ObservableArray};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Elements are opaque references.
    Reference,
    /// The container is reactive, its elements are not.
    Flat,
    /// Elements are compared structurally, never wrapped.
    Structure,
    /// Nested plain lists become reactive arrays of their own.
    #[default]
    Recursive,
}

impl WrapMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Flat => "flat",
            Self::Structure => "structure",
            Self::Recursive => "recursive",
        }
    }

    #[must_use]
    pub fn enhancer(self) -> &'static dyn Enhancer {
        match self {
            Self::Reference => &ReferenceEnhancer,
            Self::Flat => &FlatEnhancer,
            Self::Structure => &StructureEnhancer,
            Self::Recursive => &RecursiveEnhancer,
        }
    }

    pub fn enhance(self, value: Value, cx: &EnhanceContext<'_>) -> Result<Value> {
        self.enhancer().enhance(value, cx)
    }

    #[must_use]
    pub fn equals(self, a: &Value, b: &Value) -> bool {
        self.enhancer().equals(a, b)
    }
}

/// Where a value is being inserted; used to name nested containers.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceContext<'a> {
    pub runtime: &'a Runtime,
    pub parent: &'a str,
    pub index: usize,
}

impl EnhanceContext<'_> {
    fn child_name(&self) -> String {
        format!("{}[{}]", self.parent, self.index)
    }
}

/// Per-mode wrapping and equality.
pub trait Enhancer {
    /// Turn an inserted value into the stored value.
    fn enhance(&self, value: Value, cx: &EnhanceContext<'_>) -> Result<Value>;

    /// Whether replacing `a` with `b` is a no-op.
    fn equals(&self, a: &Value, b: &Value) -> bool;
}

fn reject_modifier(value: Value) -> Result<Value> {
    if value.is_modifier() {
        return Err(UsageError::ModifierNotAllowed);
    }
    Ok(value)
}

pub struct ReferenceEnhancer;

impl Enhancer for ReferenceEnhancer {
    fn enhance(&self, value: Value, _cx: &EnhanceContext<'_>) -> Result<Value> {
        reject_modifier(value)
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        a.identical(b)
    }
}

pub struct FlatEnhancer;

impl Enhancer for FlatEnhancer {
    fn enhance(&self, value: Value, _cx: &EnhanceContext<'_>) -> Result<Value> {
        reject_modifier(value)
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        a.identical(b)
    }
}

pub struct StructureEnhancer;

impl Enhancer for StructureEnhancer {
    fn enhance(&self, value: Value, _cx: &EnhanceContext<'_>) -> Result<Value> {
        reject_modifier(value)
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        a.deep_equal(b)
    }
}

pub struct RecursiveEnhancer;

impl Enhancer for RecursiveEnhancer {
    fn enhance(&self, value: Value, cx: &EnhanceContext<'_>) -> Result<Value> {
        match value {
            Value::Modified(_) => Err(UsageError::ModifierNotAllowed),
            Value::List(items) => {
                let items = Rc::try_unwrap(items).unwrap_or_else(|shared| (*shared).clone());
                let options = ArrayOptions::new()
                    .named(cx.child_name())
                    .with_mode(WrapMode::Recursive);
                ObservableArray::with_options(cx.runtime, items, options).map(Value::Array)
            }
            Value::Object(map) => {
                let parent = cx.child_name();
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (i, (key, item)) in map.iter().enumerate() {
                    let name = format!("{parent}.{key}");
                    let nested = EnhanceContext {
                        runtime: cx.runtime,
                        parent: &name,
                        index: i,
                    };
                    out.insert(key.clone(), self.enhance(item.clone(), &nested)?);
                }
                Ok(Value::Object(Rc::new(out)))
            }
            other => Ok(other),
        }
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        a.deep_equal(b)
    }
}
