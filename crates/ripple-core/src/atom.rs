#![forbid(unsafe_code)]

//! The dependency-tracking primitive.
//!
//! An [`Atom`] carries no value. Containers call
//! [`report_observed`](Atom::report_observed) on every read and
//! [`report_changed`](Atom::report_changed) after every effective write; the
//! atom forwards the first to the innermost tracking frame of its
//! [`Runtime`] and the second to every derivation that depends on it.
//!
//! Observers are held as `Weak` references and pruned lazily during
//! propagation, so a dropped derivation never keeps an atom busy.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::Runtime;

/// A computation that depends on atoms and must hear when they change.
pub trait Derivation {
    /// Runtime-unique id; atoms deduplicate observers by it.
    fn derivation_id(&self) -> u64;

    /// One of the atoms this derivation read has changed.
    fn on_became_stale(&self);
}

struct AtomInner {
    id: u64,
    name: String,
    runtime: Runtime,
    observers: RefCell<Vec<(u64, Weak<dyn Derivation>)>>,
}

/// Shared handle to a dependency-tracking primitive.
///
/// Cloning an `Atom` creates a new handle to the **same** atom.
#[derive(Clone)]
pub struct Atom {
    inner: Rc<AtomInner>,
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl Atom {
    pub fn new(runtime: &Runtime, name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(AtomInner {
                id: runtime.next_id(),
                name: name.into(),
                runtime: runtime.clone(),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Report a read. Returns whether a derivation was tracking it.
    pub fn report_observed(&self) -> bool {
        let tracked = self.inner.runtime.record_observation(self);
        tracing::trace!(message = "atom.observed", name = %self.inner.name, tracked);
        tracked
    }

    /// Report a write. Every live observer becomes stale; reactions run once
    /// the enclosing batch (or this call's own batch) ends.
    pub fn report_changed(&self) {
        tracing::trace!(message = "atom.changed", name = %self.inner.name);
        self.inner.runtime.batch(|| {
            let observers: Vec<Rc<dyn Derivation>> = {
                let mut slots = self.inner.observers.borrow_mut();
                slots.retain(|(_, weak)| weak.strong_count() > 0);
                slots.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
            };
            for observer in observers {
                observer.on_became_stale();
            }
        });
    }

    /// Number of live derivations depending on this atom.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub(crate) fn add_observer(&self, id: u64, observer: Weak<dyn Derivation>) {
        let mut slots = self.inner.observers.borrow_mut();
        if !slots.iter().any(|(existing, _)| *existing == id) {
            slots.push((id, observer));
        }
    }

    pub(crate) fn remove_observer(&self, id: u64) {
        self.inner
            .observers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }
}
