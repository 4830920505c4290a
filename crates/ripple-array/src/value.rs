#![forbid(unsafe_code)]

//! Dynamic element values.
//!
//! A [`Value`] is what an [`ObservableArray`] stores. Scalars are compared by
//! value; compound values (`List`, `Object`, `Array`, `Modified`) are shared
//! behind `Rc` and have reference identity, which is what
//! [`Value::identical`] compares. [`Value::deep_equal`] (and `==`) compares
//! structure instead.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::array::ObservableArray;
use crate::mode::WrapMode;

/// A value wrapped in a mode marker.
///
/// Modifiers are only meaningful where a reactive value is first declared;
/// everywhere else they are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub mode: WrapMode,
    pub value: Value,
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Plain list, never reactive by itself.
    List(Rc<Vec<Value>>),
    /// Plain object with insertion-ordered keys.
    Object(Rc<IndexMap<String, Value>>),
    /// Reactive sequence.
    Array(ObservableArray),
    Modified(Rc<Modifier>),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Mark `value` with a wrap mode.
    pub fn modified(mode: WrapMode, value: impl Into<Value>) -> Self {
        Self::Modified(Rc::new(Modifier {
            mode,
            value: value.into(),
        }))
    }

    /// Store the declared sequence by reference: elements are kept as-is.
    pub fn as_reference(value: impl Into<Value>) -> Self {
        Self::modified(WrapMode::Reference, value)
    }

    /// Keep the declared sequence flat: reactive itself, elements untouched.
    pub fn as_flat(value: impl Into<Value>) -> Self {
        Self::modified(WrapMode::Flat, value)
    }

    /// Compare elements of the declared sequence structurally.
    pub fn as_structure(value: impl Into<Value>) -> Self {
        Self::modified(WrapMode::Structure, value)
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Array(_) => "observable array",
            Self::Modified(_) => "modifier",
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Modified(_))
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ObservableArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Strict identity: scalars by value (`NaN` is never identical to
    /// itself), compound values by reference.
    #[must_use]
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Modified(a), Self::Modified(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Identity, except that `NaN` matches `NaN`.
    #[must_use]
    pub(crate) fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.identical(other),
        }
    }

    /// Structural equality. Plain lists and reactive arrays with the same
    /// contents are equal; reactive arrays are read without being observed.
    #[must_use]
    pub fn deep_equal(&self, other: &Value) -> bool {
        if self.identical(other) {
            return true;
        }
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.is_nan() && b.is_nan(),
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.deep_equal(w)))
            }
            (Self::Modified(a), Self::Modified(b)) => {
                a.mode == b.mode && a.value.deep_equal(&b.value)
            }
            _ => self
                .with_items(|left| {
                    other
                        .with_items(|right| {
                            left.len() == right.len()
                                && left.iter().zip(right).all(|(l, r)| l.deep_equal(r))
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(false),
        }
    }

    /// Run `f` over the elements of a list or reactive array.
    fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> Option<R> {
        match self {
            Self::List(items) => Some(f(items)),
            Self::Array(array) => Some(f(&array.peek())),
            _ => None,
        }
    }

    /// Stable address used for cycle detection.
    pub(crate) fn address(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(Rc::as_ptr(items) as usize),
            Self::Object(map) => Some(Rc::as_ptr(map) as usize),
            Self::Array(array) => Some(array.address()),
            _ => None,
        }
    }

    fn render(&self, out: &mut String, seen: &mut Vec<usize>) {
        match self {
            Self::Undefined => out.push_str("undefined"),
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Number(n) => out.push_str(&format_number(*n)),
            Self::String(s) => out.push_str(s),
            Self::Object(_) => out.push_str("[object Object]"),
            Self::Modified(m) => m.value.render(out, seen),
            Self::List(_) | Self::Array(_) => {
                let Some(addr) = self.address() else { return };
                if seen.contains(&addr) {
                    return;
                }
                seen.push(addr);
                match self {
                    Self::List(items) => render_joined(items, ",", out, seen),
                    Self::Array(array) => render_joined(&array.peek(), ",", out, seen),
                    _ => {}
                }
                seen.pop();
            }
        }
    }

    /// Default sort order: by string form, with `undefined` last.
    pub(crate) fn default_order(a: &Value, b: &Value) -> Ordering {
        match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.to_string().cmp(&b.to_string()),
        }
    }
}

/// Join `items` the way sequences are projected to strings: `undefined` and
/// `null` render empty, nested sequences render their own joins, cycles are
/// cut.
pub(crate) fn render_joined(items: &[Value], separator: &str, out: &mut String, seen: &mut Vec<usize>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        if !matches!(item, Value::Undefined | Value::Null) {
            item.render(out, seen);
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equal(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, &mut Vec::new());
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Array(array) => f
                .debug_tuple("Array")
                .field(&array.name())
                .field(&array.peek().len())
                .finish(),
            Self::Modified(m) => f
                .debug_tuple("Modified")
                .field(&m.mode)
                .field(&m.value)
                .finish(),
        }
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Number(n as f64)
            }
        })*
    };
}

from_number!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::new(items))
    }
}

impl From<ObservableArray> for Value {
    fn from(array: ObservableArray) -> Self {
        Self::Array(array)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => Self::list(items.into_iter().map(Self::from)),
            serde_json::Value::Object(map) => {
                Self::object(map.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::list(iter.into_iter().map(Into::into))
    }
}
