#![forbid(unsafe_code)]

//! Sequence administration: storage, length bookkeeping, the splice
//! primitive and change notification.
//!
//! Every structural change goes through
//! [`splice_with_array`](ArrayAdministration::splice_with_array); the only
//! other write path is single-slot assignment of an existing position.
//!
//! # Mutation order
//!
//! 1. Consult the runtime's modification guard.
//! 2. Normalise index and delete count; return early on an empty delta.
//! 3. Verify `values.len() == last_known_length`.
//! 4. Run interceptors (may rewrite, cancel, or reenter), then re-read the
//!    length and verify it again.
//! 5. Wrap every inserted value once.
//! 6. Update `last_known_length` (growing the accessor pool if needed).
//! 7. Splice storage.
//! 8. Report the change to the atom, then emit to listeners.
//!
//! Steps 1-5 touch no state, so a rejected call leaves the container exactly
//! as it was. Step 6 precedes step 7 so that a reentrant mutation triggered
//! from step 8 sees consistent bookkeeping.

use std::cell::{Cell, OnceCell, Ref, RefCell, RefMut};
use std::rc::Weak;

use ripple_core::{Atom, Interceptors, Listeners, Result, Runtime, Subscription, UsageError};

use crate::accessor::{reserve_accessors, reserved_accessors};
use crate::array::ObservableArray;
use crate::change::{ArrayChange, ArraySplice, ArrayUpdate, ArrayWillChange};
use crate::mode::{EnhanceContext, WrapMode};
use crate::value::Value;

pub struct ArrayAdministration {
    name: String,
    mode: WrapMode,
    runtime: Runtime,
    atom: Atom,
    values: RefCell<Vec<Value>>,
    last_known_length: Cell<usize>,
    change_listeners: OnceCell<Listeners<ArrayChange>>,
    interceptors: OnceCell<Interceptors<ArrayWillChange>>,
    self_ref: Weak<ArrayAdministration>,
}

fn saturating_isize(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

impl ArrayAdministration {
    /// Build an administration around already-wrapped values.
    pub(crate) fn new(
        runtime: &Runtime,
        name: String,
        mode: WrapMode,
        values: Vec<Value>,
        self_ref: Weak<ArrayAdministration>,
    ) -> Self {
        let length = values.len();
        if length > reserved_accessors() {
            reserve_accessors(length);
        }
        Self {
            atom: Atom::new(runtime, name.clone()),
            name,
            mode,
            runtime: runtime.clone(),
            values: RefCell::new(values),
            last_known_length: Cell::new(length),
            change_listeners: OnceCell::new(),
            interceptors: OnceCell::new(),
            self_ref,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> WrapMode {
        self.mode
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    fn handle(&self) -> Option<ObservableArray> {
        self.self_ref.upgrade().map(ObservableArray::from_adm)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Observed length.
    pub fn len(&self) -> usize {
        self.atom.report_observed();
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observed read of one position; `None` past the end.
    pub fn get_item(&self, index: usize) -> Option<Value> {
        let values = self.values.borrow();
        let value = values.get(index)?.clone();
        drop(values);
        self.atom.report_observed();
        Some(value)
    }

    /// Observed copy of the whole storage.
    pub fn snapshot(&self) -> Vec<Value> {
        self.atom.report_observed();
        self.values.borrow().clone()
    }

    /// Observed borrow of the storage. `f` must not mutate this container.
    pub fn with_values<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        self.atom.report_observed();
        f(&self.values.borrow())
    }

    /// Unobserved borrow of live storage.
    pub fn peek(&self) -> Ref<'_, Vec<Value>> {
        self.values.borrow()
    }

    /// Unobserved, unchecked mutable borrow of live storage.
    pub fn peek_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.values.borrow_mut()
    }

    // ── Length ───────────────────────────────────────────────────────

    /// Grow (padding with `Undefined`) or truncate to `new_length`.
    pub fn set_length(&self, new_length: i64) -> Result<()> {
        let Ok(new_length) = usize::try_from(new_length) else {
            return Err(UsageError::InvalidLength { value: new_length });
        };
        let current = self.values.borrow().len();
        if new_length > current {
            self.splice_with_array(
                Some(saturating_isize(current)),
                Some(0),
                vec![Value::Undefined; new_length - current],
            )?;
        } else if new_length < current {
            self.splice_with_array(
                Some(saturating_isize(new_length)),
                Some(saturating_isize(current - new_length)),
                Vec::new(),
            )?;
        }
        Ok(())
    }

    fn check_structure(&self, actual: usize) -> Result<()> {
        let expected = self.last_known_length.get();
        if actual != expected {
            tracing::warn!(
                message = "array.structure_corrupted",
                name = %self.name,
                expected,
                actual
            );
            return Err(UsageError::corrupted(&self.name, expected, actual));
        }
        Ok(())
    }

    fn update_length(&self, old_length: usize, removed: usize, added: usize) {
        let new_length = old_length - removed + added;
        self.last_known_length.set(new_length);
        if added > removed && new_length > reserved_accessors() {
            reserve_accessors(new_length);
        }
    }

    fn enhance_all(&self, index: usize, items: Vec<Value>) -> Result<Vec<Value>> {
        items
            .into_iter()
            .enumerate()
            .map(|(offset, value)| self.enhance(value, index + offset))
            .collect()
    }

    fn enhance(&self, value: Value, index: usize) -> Result<Value> {
        let cx = EnhanceContext {
            runtime: &self.runtime,
            parent: &self.name,
            index,
        };
        self.mode.enhance(value, &cx)
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// The canonical structural mutation.
    ///
    /// `index`: `None` means 0; past the end clamps to the length; negative
    /// counts from the end, floored at 0. `delete_count`: `None` removes
    /// everything from `index` on when nothing is inserted, and nothing
    /// otherwise; explicit counts are clamped to `[0, length - index]`.
    /// Returns the removed values in order.
    ///
    /// Interceptors may mutate this container; the proposed change is
    /// re-clamped against the length they leave behind.
    pub fn splice_with_array(
        &self,
        index: Option<isize>,
        delete_count: Option<isize>,
        new_items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        self.runtime.check_modification_allowed(&self.name)?;

        let length = self.values.borrow().len();
        let index = match index {
            None => 0,
            Some(i) if i < 0 => length.saturating_sub(i.unsigned_abs()),
            Some(i) => i.unsigned_abs().min(length),
        };
        let delete_count = match delete_count {
            None if new_items.is_empty() => length - index,
            None => 0,
            Some(c) => usize::try_from(c).unwrap_or(0).min(length - index),
        };
        if new_items.is_empty() && delete_count == 0 {
            return Ok(Vec::new());
        }

        self.check_structure(length)?;

        let (length, index, delete_count, new_items) = match self.interceptors.get() {
            Some(chain) if !chain.is_empty() => {
                let proposed = ArrayWillChange::Splice {
                    index,
                    removed_count: delete_count,
                    added: new_items,
                };
                let outcome = chain.run(proposed);
                // Handlers may have mutated this container.
                let length = self.values.borrow().len();
                self.check_structure(length)?;
                match outcome {
                    Some(ArrayWillChange::Splice {
                        index,
                        removed_count,
                        added,
                    }) => {
                        let index = index.min(length);
                        (length, index, removed_count.min(length - index), added)
                    }
                    Some(other) => {
                        tracing::warn!(
                            message = "array.interceptor_kind_mismatch",
                            name = %self.name,
                            kind = other.kind().as_str()
                        );
                        return Ok(Vec::new());
                    }
                    None => return Ok(Vec::new()),
                }
            }
            _ => (length, index, delete_count, new_items),
        };
        if new_items.is_empty() && delete_count == 0 {
            return Ok(Vec::new());
        }

        let added = self.enhance_all(index, new_items)?;

        self.update_length(length, delete_count, added.len());
        let removed: Vec<Value> = self
            .values
            .borrow_mut()
            .splice(index..index + delete_count, added.iter().cloned())
            .collect();

        self.notify_splice(index, removed.clone(), added);
        Ok(removed)
    }

    /// Assign one position. `index == len` appends; beyond that fails.
    pub fn set_item(&self, index: usize, value: Value) -> Result<()> {
        let length = self.values.borrow().len();
        if index > length {
            return Err(UsageError::IndexOutOfBounds { index, length });
        }
        if index == length {
            return self
                .splice_with_array(Some(saturating_isize(index)), Some(0), vec![value])
                .map(drop);
        }

        self.runtime.check_modification_allowed(&self.name)?;
        self.check_structure(length)?;

        let value = match self.interceptors.get() {
            Some(chain) if !chain.is_empty() => {
                let proposed = ArrayWillChange::Update {
                    index,
                    new_value: value,
                };
                let outcome = chain.run(proposed);
                self.check_structure(self.values.borrow().len())?;
                match outcome {
                    Some(ArrayWillChange::Update { new_value, .. }) => new_value,
                    Some(other) => {
                        tracing::warn!(
                            message = "array.interceptor_kind_mismatch",
                            name = %self.name,
                            kind = other.kind().as_str()
                        );
                        return Ok(());
                    }
                    None => return Ok(()),
                }
            }
            _ => value,
        };

        let new_value = self.enhance(value, index)?;
        let Some(old_value) = self.values.borrow().get(index).cloned() else {
            let length = self.values.borrow().len();
            return Err(UsageError::IndexOutOfBounds { index, length });
        };
        if self.mode.equals(&old_value, &new_value) {
            return Ok(());
        }
        self.values.borrow_mut()[index] = new_value.clone();
        self.notify_update(index, old_value, new_value);
        Ok(())
    }

    // ── Notification ─────────────────────────────────────────────────

    fn listeners(&self) -> Option<&Listeners<ArrayChange>> {
        self.change_listeners.get().filter(|l| !l.is_empty())
    }

    fn notify_splice(&self, index: usize, removed: Vec<Value>, added: Vec<Value>) {
        tracing::debug!(
            message = "array.splice",
            name = %self.name,
            index,
            removed = removed.len(),
            added = added.len()
        );
        self.atom.report_changed();
        if let Some(listeners) = self.listeners()
            && let Some(source) = self.handle()
        {
            listeners.emit(&ArrayChange::Splice(ArraySplice {
                source,
                index,
                added_count: added.len(),
                removed,
                added,
            }));
        }
    }

    fn notify_update(&self, index: usize, old_value: Value, new_value: Value) {
        tracing::debug!(message = "array.update", name = %self.name, index);
        self.atom.report_changed();
        if let Some(listeners) = self.listeners()
            && let Some(source) = self.handle()
        {
            listeners.emit(&ArrayChange::Update(ArrayUpdate {
                source,
                index,
                old_value,
                new_value,
            }));
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a change listener. With `fire_immediately`, the listener
    /// first receives a splice describing the current contents.
    pub fn observe(
        &self,
        listener: impl Fn(&ArrayChange) + 'static,
        fire_immediately: bool,
    ) -> Subscription {
        if fire_immediately && let Some(source) = self.handle() {
            let added = self.values.borrow().clone();
            listener(&ArrayChange::Splice(ArraySplice {
                source,
                index: 0,
                removed: Vec::new(),
                added_count: added.len(),
                added,
            }));
        }
        self.change_listeners.get_or_init(Listeners::new).on(listener)
    }

    pub fn intercept(
        &self,
        handler: impl Fn(ArrayWillChange) -> Option<ArrayWillChange> + 'static,
    ) -> Subscription {
        self.interceptors
            .get_or_init(Interceptors::new)
            .intercept(handler)
    }

    pub fn has_listeners(&self) -> bool {
        self.listeners().is_some()
    }
}
