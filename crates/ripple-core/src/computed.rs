#![forbid(unsafe_code)]

//! Lazy computed values that track their own dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. The compute function runs under a tracking
//! frame, so every atom it reads becomes a dependency; when any of them
//! changes, the cached value is invalidated (marked dirty) and the computed's
//! own atom reports a change so reactions reading it re-run. The next call to
//! [`get()`](Computed::get) recomputes and caches the result.
//!
//! The compute function is a pure derivation: it runs with state
//! modifications disallowed, so a container mutated from inside it fails
//! with [`UsageError::ModificationNotAllowed`](crate::UsageError).
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    dependencies (no stale reads after a dependency mutation completes).
//! 2. The compute function is called at most once per dependency change cycle
//!    (memoization).
//! 3. If no dependency has changed, `get()` returns the cached value.
//! 4. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: The cached value remains from the last
//!   successful computation. The dirty flag stays set so the next `get()` will
//!   retry.
//! - **Dependency dropped**: The computed keeps its last cached result and
//!   never becomes dirty again from that source.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{Atom, Derivation};
use crate::runtime::Runtime;

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    id: u64,
    runtime: Runtime,
    /// Reported on read, changed on invalidation.
    atom: Atom,
    compute: Box<dyn Fn() -> T>,
    /// Cached result (None only before first computation).
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    /// Monotonically increasing version, bumped on each recomputation.
    version: Cell<u64>,
    deps: RefCell<Vec<Atom>>,
    self_ref: Weak<ComputedInner<T>>,
}

impl<T: 'static> ComputedInner<T> {
    fn rebind(&self, atoms: Vec<Atom>) {
        let previous = std::mem::take(&mut *self.deps.borrow_mut());
        for atom in &previous {
            atom.remove_observer(self.id);
        }
        for atom in &atoms {
            let weak: Weak<dyn Derivation> = self.self_ref.clone();
            atom.add_observer(self.id, weak);
        }
        *self.deps.borrow_mut() = atoms;
    }
}

impl<T: 'static> Derivation for ComputedInner<T> {
    fn derivation_id(&self) -> u64 {
        self.id
    }

    fn on_became_stale(&self) {
        if !self.dirty.replace(true) {
            self.atom.report_changed();
        }
    }
}

/// A lazily-evaluated, memoized value derived from whatever it reads.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.atom.name())
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. Nothing runs until the first read.
    pub fn new(runtime: &Runtime, name: impl Into<String>, compute: impl Fn() -> T + 'static) -> Self {
        let name = name.into();
        let id = runtime.next_id();
        let atom = Atom::new(runtime, name);
        let inner = Rc::new_cyclic(|self_ref| ComputedInner {
            id,
            runtime: runtime.clone(),
            atom,
            compute: Box::new(compute),
            cached: RefCell::new(None),
            dirty: Cell::new(true),
            version: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    fn refresh(&self) {
        let inner = &self.inner;
        if !inner.dirty.get() && inner.cached.borrow().is_some() {
            return;
        }
        let (value, observations) = inner
            .runtime
            .track(|| inner.runtime.allow_state_changes(false, || (inner.compute)()));
        *inner.cached.borrow_mut() = Some(value);
        inner.dirty.set(false);
        inner.version.set(inner.version.get() + 1);
        inner.rebind(observations.distinct());
    }

    /// Get the current value, recomputing if any dependency has changed.
    ///
    /// Returns a clone of the cached value and reports an observation of
    /// this computed to any tracking derivation.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure attempts to call `get()` on the same
    /// `Computed` after invalidating it (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        self.inner.atom.report_observed();
        let cached = self.inner.cached.borrow();
        f(cached.as_ref().expect("cached is always Some after refresh"))
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force invalidation of the cached value. The next `get()` will
    /// recompute.
    pub fn invalidate(&self) {
        self.inner.on_became_stale();
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// The atom reads of this computed are reported on.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.inner.atom
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UsageError;
    use crate::reaction::Reaction;

    /// Minimal observable cell for exercising dependency tracking.
    #[derive(Clone)]
    struct Cellish {
        atom: Atom,
        value: Rc<Cell<i32>>,
    }

    impl Cellish {
        fn new(rt: &Runtime, value: i32) -> Self {
            Self {
                atom: Atom::new(rt, "cell"),
                value: Rc::new(Cell::new(value)),
            }
        }

        fn get(&self) -> i32 {
            self.atom.report_observed();
            self.value.get()
        }

        fn set(&self, value: i32) -> crate::Result<()> {
            self.atom
                .runtime()
                .check_modification_allowed(self.atom.name())?;
            if self.value.replace(value) != value {
                self.atom.report_changed();
            }
            Ok(())
        }
    }

    #[test]
    fn single_dep_computed() {
        let rt = Runtime::new();
        let source = Cellish::new(&rt, 10);
        let s = source.clone();
        let computed = Computed::new(&rt, "double", move || s.get() * 2);

        assert_eq!(computed.get(), 20);
        assert_eq!(computed.version(), 1);

        source.set(5).unwrap();
        assert!(computed.is_dirty());
        assert_eq!(computed.get(), 10);
        assert_eq!(computed.version(), 2);
    }

    #[test]
    fn lazy_evaluation() {
        let rt = Runtime::new();
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let computed = Computed::new(&rt, "lazy", move || {
            c.set(c.get() + 1);
            42
        });

        assert_eq!(count.get(), 0);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn memoization_until_dependency_changes() {
        let rt = Runtime::new();
        let count = Rc::new(Cell::new(0u32));
        let source = Cellish::new(&rt, 10);
        let (c, s) = (Rc::clone(&count), source.clone());
        let computed = Computed::new(&rt, "memo", move || {
            c.set(c.get() + 1);
            s.get() * 2
        });

        assert_eq!(computed.get(), 20);
        assert_eq!(computed.get(), 20);
        assert_eq!(count.get(), 1);

        source.set(20).unwrap();
        assert_eq!(computed.get(), 40);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let rt = Runtime::new();
        let computed = Computed::new(&rt, "c", || 5);
        assert_eq!(computed.get(), 5);
        computed.invalidate();
        assert!(computed.is_dirty());
        assert_eq!(computed.get(), 5);
        assert_eq!(computed.version(), 2);
    }

    #[test]
    fn derivation_may_not_modify_state() {
        let rt = Runtime::new();
        let target = Cellish::new(&rt, 0);
        let t = target.clone();
        let computed = Computed::new(&rt, "impure", move || t.set(1));
        assert!(matches!(
            computed.get(),
            Err(UsageError::ModificationNotAllowed { .. })
        ));
        assert_eq!(target.value.get(), 0);
        assert!(rt.modifications_allowed());
    }

    #[test]
    fn reaction_sees_computed_changes() {
        let rt = Runtime::new();
        let source = Cellish::new(&rt, 1);
        let s = source.clone();
        let doubled = Computed::new(&rt, "doubled", move || s.get() * 2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (d, out) = (doubled.clone(), Rc::clone(&seen));
        let _reaction = Reaction::new(&rt, "log", move || out.borrow_mut().push(d.get()));

        source.set(2).unwrap();
        source.set(3).unwrap();
        assert_eq!(*seen.borrow(), vec![2, 4, 6]);
    }

    #[test]
    fn clone_shares_state() {
        let rt = Runtime::new();
        let source = Cellish::new(&rt, 10);
        let s = source.clone();
        let c1 = Computed::new(&rt, "c", move || s.get() + 1);
        let c2 = c1.clone();
        assert_eq!(c1.get(), 11);
        source.set(20).unwrap();
        assert_eq!(c2.get(), 21);
        assert_eq!(c1.version(), 2);
    }

    #[test]
    fn debug_format() {
        let rt = Runtime::new();
        let computed = Computed::new(&rt, "answer", || 42);
        let _ = computed.get();
        let dbg = format!("{computed:?}");
        assert!(dbg.contains("Computed"));
        assert!(dbg.contains("42"));
    }
}
