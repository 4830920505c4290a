#![forbid(unsafe_code)]

//! The public, array-shaped container.
//!
//! [`ObservableArray`] is a thin handle around an
//! [`ArrayAdministration`]. Cloning the handle shares the administration;
//! there is no state on the handle itself.
//!
//! # Reads
//!
//! Every read (`len`, `get`, the derived views) reports exactly one
//! observation to the runtime before answering. Derived views that call
//! back into user code work on a snapshot, so callbacks may freely mutate
//! the container. [`peek`](ObservableArray::peek) is the one read that
//! reports nothing.
//!
//! # Writes
//!
//! All structural mutation funnels into
//! [`splice_with`](ObservableArray::splice_with). `reverse`, `sort` and
//! `sort_by` never mutate: they return a reordered copy.

use std::cell::{Ref, RefMut};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use ripple_core::{Atom, Result, Runtime, Subscription};

use crate::accessor::{IndexAccessor, shared_accessor};
use crate::admin::ArrayAdministration;
use crate::change::{ArrayChange, ArrayWillChange};
use crate::mode::{EnhanceContext, WrapMode};
use crate::plain;
use crate::value::{Value, render_joined};

/// Per-container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayOptions {
    name: Option<String>,
    mode: WrapMode,
}

impl ArrayOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostic name; defaults to `ObservableArray@<id>`.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: WrapMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> WrapMode {
        self.mode
    }
}

/// Reactive sequence handle.
#[derive(Clone)]
pub struct ObservableArray {
    adm: Rc<ArrayAdministration>,
}

impl ObservableArray {
    // ── Construction ─────────────────────────────────────────────────

    /// Create a container seeded with `values`, each wrapped once according
    /// to `mode`. Construction emits no change.
    pub fn new(
        runtime: &Runtime,
        values: impl IntoIterator<Item = Value>,
        mode: WrapMode,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::with_options(
            runtime,
            values,
            ArrayOptions::new().named(name).with_mode(mode),
        )
    }

    pub fn with_options(
        runtime: &Runtime,
        values: impl IntoIterator<Item = Value>,
        options: ArrayOptions,
    ) -> Result<Self> {
        let ArrayOptions { name, mode } = options;
        let name = name.unwrap_or_else(|| default_name(runtime));
        let wrapped = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let cx = EnhanceContext {
                    runtime,
                    parent: &name,
                    index,
                };
                mode.enhance(value, &cx)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::seeded(runtime, name, mode, wrapped))
    }

    /// An empty container in the default (recursive) mode.
    #[must_use]
    pub fn empty(runtime: &Runtime) -> Self {
        Self::seeded(runtime, default_name(runtime), WrapMode::default(), Vec::new())
    }

    fn seeded(runtime: &Runtime, name: String, mode: WrapMode, values: Vec<Value>) -> Self {
        tracing::trace!(message = "array.created", name = %name, mode = mode.label(), len = values.len());
        let adm = Rc::new_cyclic(|self_ref| {
            ArrayAdministration::new(runtime, name, mode, values, self_ref.clone())
        });
        Self { adm }
    }

    pub(crate) fn from_adm(adm: Rc<ArrayAdministration>) -> Self {
        Self { adm }
    }

    // ── Identity ─────────────────────────────────────────────────────

    #[must_use]
    pub fn administration(&self) -> &ArrayAdministration {
        &self.adm
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.adm.name()
    }

    #[must_use]
    pub fn mode(&self) -> WrapMode {
        self.adm.mode()
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        self.adm.runtime()
    }

    /// The atom reads and writes are reported on.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        self.adm.atom()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ObservableArray) -> bool {
        Rc::ptr_eq(&self.adm, &other.adm)
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.adm) as usize
    }

    // ── Length and indexing ──────────────────────────────────────────

    #[must_use]
    pub fn len(&self) -> usize {
        self.adm.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adm.is_empty()
    }

    /// Grow (padding with `Undefined`) or truncate. Negative lengths are
    /// rejected.
    pub fn set_length(&self, new_length: i64) -> Result<()> {
        self.adm.set_length(new_length)
    }

    /// Value at `index`, or `None` past the end. Never fails.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.adm.get_item(index)
    }

    /// Assign `index`. Assigning `len()` appends; anything further is out of
    /// bounds.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.adm.set_item(index, value.into())
    }

    /// The shared accessor for `index`, if the pool covers it.
    #[must_use]
    pub fn accessor(&self, index: usize) -> Option<IndexAccessor> {
        shared_accessor(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<Value> {
        self.adm.with_values(|values| values.first().cloned())
    }

    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.adm.with_values(|values| values.last().cloned())
    }

    // ── Structural mutation ──────────────────────────────────────────

    /// The canonical mutation, with every argument in its raw form.
    /// See [`ArrayAdministration::splice_with_array`].
    pub fn splice_with(
        &self,
        index: Option<isize>,
        delete_count: Option<isize>,
        items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        self.adm.splice_with_array(index, delete_count, items)
    }

    /// Remove `delete_count` values at `index` (negative counts from the
    /// end) and insert `items` there. Returns the removed values.
    pub fn splice(
        &self,
        index: isize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let delete_count = isize::try_from(delete_count).unwrap_or(isize::MAX);
        self.splice_with(Some(index), Some(delete_count), items.into_iter().collect())
    }

    /// Remove everything from `index` on.
    pub fn splice_from(&self, index: isize) -> Result<Vec<Value>> {
        self.splice_with(Some(index), None, Vec::new())
    }

    /// Append one value; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.push_all([value.into()])
    }

    /// Append values; returns the new length.
    pub fn push_all(&self, items: impl IntoIterator<Item = Value>) -> Result<usize> {
        let end = self.raw_len();
        self.splice_with(Some(end), Some(0), items.into_iter().collect())?;
        Ok(self.adm.peek().len())
    }

    /// Prepend values; returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> Result<usize> {
        self.splice_with(Some(0), Some(0), items.into_iter().collect())?;
        Ok(self.adm.peek().len())
    }

    /// Remove and return the last value.
    pub fn pop(&self) -> Result<Option<Value>> {
        let last = (self.raw_len() - 1).max(0);
        Ok(self.splice_with(Some(last), Some(1), Vec::new())?.pop())
    }

    /// Remove and return the first value.
    pub fn shift(&self) -> Result<Option<Value>> {
        Ok(self
            .splice_with(Some(0), Some(1), Vec::new())?
            .into_iter()
            .next())
    }

    /// Remove everything; returns the removed values.
    pub fn clear(&self) -> Result<Vec<Value>> {
        self.splice_with(Some(0), None, Vec::new())
    }

    /// Replace the whole contents; returns the previous values.
    pub fn replace(&self, items: impl IntoIterator<Item = Value>) -> Result<Vec<Value>> {
        let len = self.raw_len();
        self.splice_with(Some(0), Some(len), items.into_iter().collect())
    }

    /// Remove the first value identical to `value`. Returns whether one was
    /// found.
    pub fn remove(&self, value: &Value) -> Result<bool> {
        let position = self.adm.peek().iter().position(|v| v.identical(value));
        match position {
            Some(index) => {
                let index = isize::try_from(index).unwrap_or(isize::MAX);
                self.splice_with(Some(index), Some(1), Vec::new())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn raw_len(&self) -> isize {
        isize::try_from(self.adm.peek().len()).unwrap_or(isize::MAX)
    }

    // ── Derived views ────────────────────────────────────────────────

    /// Observed copy of the contents.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.adm.snapshot()
    }

    /// Iterate over an observed snapshot.
    #[must_use]
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Copy of `[start, end)`; negative bounds count from the end.
    #[must_use]
    pub fn slice(&self, start: isize, end: Option<isize>) -> Vec<Value> {
        self.adm.with_values(|values| {
            let len = values.len();
            let start = relative_bound(start, len);
            let end = end.map_or(len, |e| relative_bound(e, len));
            if end <= start {
                Vec::new()
            } else {
                values[start..end].to_vec()
            }
        })
    }

    /// Position of the first value identical to `value`.
    #[must_use]
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.adm
            .with_values(|values| values.iter().position(|v| v.identical(value)))
    }

    /// Position of the last value identical to `value`.
    #[must_use]
    pub fn last_index_of(&self, value: &Value) -> Option<usize> {
        self.adm
            .with_values(|values| values.iter().rposition(|v| v.identical(value)))
    }

    /// Membership; unlike `index_of`, `NaN` finds `NaN`.
    #[must_use]
    pub fn includes(&self, value: &Value) -> bool {
        self.adm
            .with_values(|values| values.iter().any(|v| v.same_value_zero(value)))
    }

    /// Contents followed by `items`; lists and arrays among `items` are
    /// spread one level.
    #[must_use]
    pub fn concat(&self, items: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut out = self.to_vec();
        for item in items {
            match item {
                Value::List(list) => out.extend(list.iter().cloned()),
                Value::Array(array) => out.extend(array.to_vec()),
                other => out.push(other),
            }
        }
        out
    }

    pub fn map<R>(&self, mut f: impl FnMut(&Value, usize) -> R) -> Vec<R> {
        self.to_vec()
            .iter()
            .enumerate()
            .map(|(i, v)| f(v, i))
            .collect()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Vec<Value> {
        self.to_vec()
            .into_iter()
            .enumerate()
            .filter(|(i, v)| predicate(v, *i))
            .map(|(_, v)| v)
            .collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) {
        for (i, v) in self.to_vec().iter().enumerate() {
            f(v, i);
        }
    }

    pub fn reduce<A>(&self, init: A, mut f: impl FnMut(A, &Value, usize) -> A) -> A {
        self.to_vec()
            .iter()
            .enumerate()
            .fold(init, |acc, (i, v)| f(acc, v, i))
    }

    pub fn reduce_right<A>(&self, init: A, mut f: impl FnMut(A, &Value, usize) -> A) -> A {
        self.to_vec()
            .iter()
            .enumerate()
            .rev()
            .fold(init, |acc, (i, v)| f(acc, v, i))
    }

    pub fn find(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Option<Value> {
        self.to_vec()
            .into_iter()
            .enumerate()
            .find(|(i, v)| predicate(v, *i))
            .map(|(_, v)| v)
    }

    pub fn find_index(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Option<usize> {
        self.to_vec()
            .iter()
            .enumerate()
            .position(|(i, v)| predicate(v, i))
    }

    pub fn every(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> bool {
        self.to_vec()
            .iter()
            .enumerate()
            .all(|(i, v)| predicate(v, i))
    }

    pub fn some(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> bool {
        self.to_vec()
            .iter()
            .enumerate()
            .any(|(i, v)| predicate(v, i))
    }

    /// String projection with `separator` between values.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.adm.with_values(|values| {
            let mut out = String::new();
            let mut seen = vec![self.address()];
            render_joined(values, separator, &mut out, &mut seen);
            out
        })
    }

    /// Reversed copy. The container itself is left untouched.
    #[must_use]
    pub fn reverse(&self) -> Vec<Value> {
        let mut out = self.to_vec();
        out.reverse();
        out
    }

    /// Copy sorted by string form (`undefined` last). The container itself
    /// is left untouched.
    #[must_use]
    pub fn sort(&self) -> Vec<Value> {
        self.sort_by(Value::default_order)
    }

    /// Copy sorted with `compare`. The container itself is left untouched.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Vec<Value> {
        let mut out = self.to_vec();
        out.sort_by(compare);
        out
    }

    /// Unwrapped, plain-data projection for serialization.
    #[must_use]
    pub fn to_plain(&self) -> serde_json::Value {
        plain::to_plain(&Value::Array(self.clone()))
    }

    // ── Escape hatches ───────────────────────────────────────────────

    /// Live storage, without reporting an observation.
    ///
    /// Reading through `peek` inside a derivation hides the dependency: the
    /// derivation will not re-run when this container changes.
    #[must_use]
    pub fn peek(&self) -> Ref<'_, Vec<Value>> {
        self.adm.peek()
    }

    /// Live, mutable storage, bypassing wrapping, guards and notification.
    ///
    /// Changing the length through this borrow makes every later mutation
    /// fail with [`UsageError::StructureCorrupted`](ripple_core::UsageError).
    #[must_use]
    pub fn peek_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.adm.peek_mut()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Listen for changes. With `fire_immediately`, `listener` first
    /// receives a splice covering the current contents, before this returns.
    pub fn observe(
        &self,
        listener: impl Fn(&ArrayChange) + 'static,
        fire_immediately: bool,
    ) -> Subscription {
        self.adm.observe(listener, fire_immediately)
    }

    /// Register a hook that sees each change before it is applied and may
    /// rewrite or cancel it.
    pub fn intercept(
        &self,
        handler: impl Fn(ArrayWillChange) -> Option<ArrayWillChange> + 'static,
    ) -> Subscription {
        self.adm.intercept(handler)
    }
}

fn default_name(runtime: &Runtime) -> String {
    format!("ObservableArray@{}", runtime.next_id())
}

fn relative_bound(bound: isize, len: usize) -> usize {
    if bound < 0 {
        len.saturating_sub(bound.unsigned_abs())
    } else {
        bound.unsigned_abs().min(len)
    }
}

impl PartialEq for ObservableArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObservableArray {}

impl fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableArray")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .field("values", &*self.peek())
            .finish()
    }
}

impl fmt::Display for ObservableArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join(","))
    }
}

impl<'a> IntoIterator for &'a ObservableArray {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use ripple_core::UsageError;
    use std::cell::RefCell;

    fn nums(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::from).collect()
    }

    fn array(rt: &Runtime, values: &[i32]) -> ObservableArray {
        ObservableArray::new(rt, nums(values), WrapMode::Recursive, "xs").unwrap()
    }

    #[test]
    fn construction_wraps_and_seeds() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3]);
        assert_eq!(xs.len(), 3);
        assert_eq!(xs.name(), "xs");
        assert_eq!(xs.to_vec(), nums(&[1, 2, 3]));
    }

    #[test]
    fn construction_rejects_modifiers() {
        let rt = Runtime::new();
        let err = ObservableArray::new(
            &rt,
            [Value::as_flat(Value::from(1))],
            WrapMode::Flat,
            "bad",
        )
        .unwrap_err();
        assert_eq!(err, UsageError::ModifierNotAllowed);
    }

    #[test]
    fn default_names_are_unique() {
        let rt = Runtime::new();
        let a = ObservableArray::empty(&rt);
        let b = ObservableArray::empty(&rt);
        assert!(a.name().starts_with("ObservableArray@"));
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn push_pop_shift_unshift() {
        let rt = Runtime::new();
        let xs = array(&rt, &[2]);
        assert_eq!(xs.push(3).unwrap(), 2);
        assert_eq!(xs.unshift(nums(&[0, 1])).unwrap(), 4);
        assert_eq!(xs.to_vec(), nums(&[0, 1, 2, 3]));
        assert_eq!(xs.pop().unwrap(), Some(Value::from(3)));
        assert_eq!(xs.shift().unwrap(), Some(Value::from(0)));
        assert_eq!(xs.to_vec(), nums(&[1, 2]));
    }

    #[test]
    fn pop_and_shift_on_empty_are_noops() {
        let rt = Runtime::new();
        let xs = ObservableArray::empty(&rt);
        assert_eq!(xs.pop().unwrap(), None);
        assert_eq!(xs.shift().unwrap(), None);
    }

    #[test]
    fn splice_normalises_arguments() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3, 4, 5]);
        // Negative index counts from the end.
        assert_eq!(xs.splice(-2, 1, []).unwrap(), nums(&[4]));
        // Index past the end clamps to the length.
        assert_eq!(xs.splice(99, 5, nums(&[9])).unwrap(), nums(&[]));
        assert_eq!(xs.to_vec(), nums(&[1, 2, 3, 5, 9]));
        // Oversized delete counts are clamped.
        assert_eq!(xs.splice(3, 100, []).unwrap(), nums(&[5, 9]));
        // Very negative index floors at 0.
        assert_eq!(xs.splice(-50, 1, []).unwrap(), nums(&[1]));
        assert_eq!(xs.to_vec(), nums(&[2, 3]));
    }

    #[test]
    fn splice_with_raw_arguments() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3, 4]);
        // Only a position: remove to the end.
        assert_eq!(xs.splice_with(Some(2), None, vec![]).unwrap(), nums(&[3, 4]));
        // Negative count clamps to zero.
        assert_eq!(
            xs.splice_with(Some(0), Some(-3), nums(&[0])).unwrap(),
            nums(&[])
        );
        // Missing index defaults to 0.
        assert_eq!(xs.splice_with(None, Some(1), vec![]).unwrap(), nums(&[0]));
        assert_eq!(xs.to_vec(), nums(&[1, 2]));
        assert_eq!(xs.splice_from(-1).unwrap(), nums(&[2]));
    }

    #[test]
    fn omitted_count_with_items_only_inserts() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3]);
        assert_eq!(xs.splice_with(Some(1), None, nums(&[9])).unwrap(), nums(&[]));
        assert_eq!(xs.to_vec(), nums(&[1, 9, 2, 3]));
        assert_eq!(xs.splice_with(None, None, nums(&[0])).unwrap(), nums(&[]));
        assert_eq!(xs.to_vec(), nums(&[0, 1, 9, 2, 3]));
    }

    #[test]
    fn clear_and_replace() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2]);
        assert_eq!(xs.replace(nums(&[7, 8, 9])).unwrap(), nums(&[1, 2]));
        assert_eq!(xs.to_vec(), nums(&[7, 8, 9]));
        assert_eq!(xs.clear().unwrap(), nums(&[7, 8, 9]));
        assert!(xs.is_empty());
    }

    #[test]
    fn set_length_pads_and_truncates() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2]);
        xs.set_length(4).unwrap();
        assert_eq!(xs.len(), 4);
        assert!(xs.get(3).unwrap().is_undefined());
        xs.set_length(1).unwrap();
        assert_eq!(xs.to_vec(), nums(&[1]));
        assert_eq!(
            xs.set_length(-1),
            Err(UsageError::InvalidLength { value: -1 })
        );
        assert_eq!(xs.len(), 1);
    }

    #[test]
    fn get_is_total() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1]);
        assert_eq!(xs.get(0), Some(Value::from(1)));
        assert_eq!(xs.get(1), None);
        assert_eq!(xs.get(usize::MAX), None);
    }

    #[test]
    fn set_appends_at_length_and_rejects_beyond() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3]);
        xs.set(3, 4).unwrap();
        assert_eq!(xs.len(), 4);
        assert_eq!(
            xs.set(6, 0),
            Err(UsageError::IndexOutOfBounds {
                index: 6,
                length: 4
            })
        );
        assert_eq!(xs.to_vec(), nums(&[1, 2, 3, 4]));
    }

    #[test]
    fn remove_by_value() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3, 2]);
        assert!(xs.remove(&Value::from(2)).unwrap());
        assert_eq!(xs.to_vec(), nums(&[1, 3, 2]));
        assert!(!xs.remove(&Value::from(42)).unwrap());
    }

    #[test]
    fn query_views() {
        let rt = Runtime::new();
        let xs = array(&rt, &[3, 1, 2, 1]);
        assert_eq!(xs.slice(1, Some(-1)), nums(&[1, 2]));
        assert_eq!(xs.slice(-2, None), nums(&[2, 1]));
        assert_eq!(xs.slice(3, Some(1)), nums(&[]));
        assert_eq!(xs.index_of(&Value::from(1)), Some(1));
        assert_eq!(xs.last_index_of(&Value::from(1)), Some(3));
        assert_eq!(xs.index_of(&Value::from(9)), None);
        assert!(xs.includes(&Value::from(2)));
        assert_eq!(
            xs.map(|v, i| v.as_f64().unwrap() as usize + i),
            vec![3, 2, 4, 4]
        );
        assert_eq!(
            xs.filter(|v, _| v.as_f64() == Some(1.0)),
            nums(&[1, 1])
        );
        assert_eq!(
            xs.reduce(0.0, |acc, v, _| acc + v.as_f64().unwrap()),
            7.0
        );
        assert_eq!(
            xs.reduce_right(String::new(), |acc, v, _| acc + &v.to_string()),
            "1213"
        );
        assert_eq!(xs.find(|v, _| v.as_f64() == Some(2.0)), Some(Value::from(2)));
        assert_eq!(xs.find_index(|v, _| v.as_f64() == Some(2.0)), Some(2));
        assert!(xs.every(|v, _| v.as_f64().is_some()));
        assert!(!xs.some(|v, _| v.is_undefined()));
        assert_eq!(xs.first(), Some(Value::from(3)));
        assert_eq!(xs.last(), Some(Value::from(1)));
    }

    #[test]
    fn includes_finds_nan_but_index_of_does_not() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(&rt, [Value::from(f64::NAN)], WrapMode::Flat, "n").unwrap();
        assert!(xs.includes(&Value::from(f64::NAN)));
        assert_eq!(xs.index_of(&Value::from(f64::NAN)), None);
    }

    #[test]
    fn concat_spreads_one_level() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1]);
        let ys = array(&rt, &[2, 3]);
        let joined = xs.concat([
            Value::Array(ys),
            Value::list(nums(&[4])),
            Value::from(5),
        ]);
        assert_eq!(joined, nums(&[1, 2, 3, 4, 5]));
        assert_eq!(xs.len(), 1);
    }

    #[test]
    fn join_and_display() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(
            &rt,
            [Value::from(1), Value::Null, Value::from("a"), Value::Undefined],
            WrapMode::Flat,
            "j",
        )
        .unwrap();
        assert_eq!(xs.join("-"), "1--a-");
        assert_eq!(xs.to_string(), "1,,a,");
    }

    #[test]
    fn join_survives_self_reference() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(&rt, nums(&[1]), WrapMode::Flat, "loop").unwrap();
        xs.push(Value::Array(xs.clone())).unwrap();
        assert_eq!(xs.join(","), "1,");
    }

    #[test]
    fn reverse_and_sort_do_not_mutate() {
        let rt = Runtime::new();
        let xs = array(&rt, &[3, 10, 2]);
        assert_eq!(xs.reverse(), nums(&[2, 10, 3]));
        assert_eq!(xs.sort(), nums(&[10, 2, 3]));
        assert_eq!(
            xs.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap()),
            nums(&[2, 3, 10])
        );
        assert_eq!(xs.to_vec(), nums(&[3, 10, 2]));
    }

    #[test]
    fn callbacks_may_mutate_the_container() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2]);
        xs.for_each(|v, _| {
            xs.push(v.clone()).unwrap();
        });
        assert_eq!(xs.to_vec(), nums(&[1, 2, 1, 2]));
    }

    #[test]
    fn iterates_over_snapshot() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2, 3]);
        let mut total = 0.0;
        for v in &xs {
            total += v.as_f64().unwrap();
        }
        assert_eq!(total, 6.0);
    }

    #[test]
    fn recursive_mode_wraps_nested_lists_once() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(
            &rt,
            [Value::list(nums(&[1, 2]))],
            WrapMode::Recursive,
            "outer",
        )
        .unwrap();
        let inner = xs.get(0).unwrap();
        let inner = inner.as_array().expect("wrapped");
        assert_eq!(inner.name(), "outer[0]");
        // Reading again hands back the same container.
        assert!(xs.get(0).unwrap().identical(&Value::Array(inner.clone())));
    }

    #[test]
    fn flat_mode_leaves_lists_alone() {
        let rt = Runtime::new();
        let list = Value::list(nums(&[1]));
        let xs = ObservableArray::new(&rt, [list.clone()], WrapMode::Flat, "flat").unwrap();
        assert!(xs.get(0).unwrap().identical(&list));
    }

    #[test]
    fn peek_mut_tampering_is_detected() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1, 2]);
        xs.peek_mut().push(Value::from(3));
        let err = xs.push(4).unwrap_err();
        assert_eq!(err, UsageError::corrupted("xs", 2, 3));
        assert_eq!(xs.peek().len(), 3);
    }

    #[test]
    fn accessors_forward_to_the_container() {
        let rt = Runtime::new();
        let xs = array(&rt, &[5, 6]);
        let acc = xs.accessor(1).expect("reserved");
        assert_eq!(acc.get(&xs), Some(Value::from(6)));
        acc.set(&xs, 7).unwrap();
        assert_eq!(xs.get(1), Some(Value::from(7)));
    }

    #[test]
    fn growth_extends_accessor_pool() {
        let rt = Runtime::new();
        let reserved = crate::accessor::reserved_accessors();
        let xs = ObservableArray::empty(&rt);
        xs.set_length(i64::try_from(reserved).unwrap() + 5).unwrap();
        assert!(crate::accessor::reserved_accessors() >= reserved + 5);
        assert!(xs.accessor(reserved + 4).is_some());
    }

    #[test]
    fn debug_lists_values() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1]);
        let dbg = format!("{xs:?}");
        assert!(dbg.contains("ObservableArray"));
        assert!(dbg.contains("xs"));
    }

    #[test]
    fn handles_compare_by_identity() {
        let rt = Runtime::new();
        let a = array(&rt, &[1]);
        let b = array(&rt, &[1]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn listener_can_record_changes() {
        let rt = Runtime::new();
        let xs = array(&rt, &[1]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = xs.observe(move |c| sink.borrow_mut().push(c.kind()), false);
        xs.push(2).unwrap();
        xs.set(0, 9).unwrap();
        xs.set(0, 9).unwrap();
        assert_eq!(*log.borrow(), vec![ChangeKind::Splice, ChangeKind::Update]);
    }
}
