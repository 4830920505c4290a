#![forbid(unsafe_code)]

//! Side effects that re-run when what they read changes.
//!
//! A [`Reaction`] runs its effect immediately, remembers every atom the
//! effect observed, and runs again (once per outermost batch) whenever any
//! of them reports a change. Dependencies are collected afresh on every run,
//! so branches that stop reading an atom stop depending on it.
//!
//! Dropping the handle disposes the reaction.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{Atom, Derivation};
use crate::runtime::{Runtime, Scheduled};

struct ReactionInner {
    id: u64,
    name: String,
    runtime: Runtime,
    effect: RefCell<Box<dyn FnMut()>>,
    deps: RefCell<Vec<Atom>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
    runs: Cell<u64>,
    self_ref: Weak<ReactionInner>,
}

impl ReactionInner {
    fn run(&self) {
        if self.disposed.get() {
            return;
        }
        let Ok(mut effect) = self.effect.try_borrow_mut() else {
            tracing::warn!(message = "reaction.reentrant_run_skipped", name = %self.name);
            return;
        };
        tracing::debug!(message = "reaction.run", name = %self.name);
        let ((), observations) = self.runtime.track(|| (*effect)());
        drop(effect);
        self.runs.set(self.runs.get() + 1);
        self.rebind(observations.distinct());
    }

    fn rebind(&self, atoms: Vec<Atom>) {
        let previous = std::mem::take(&mut *self.deps.borrow_mut());
        for atom in &previous {
            atom.remove_observer(self.id);
        }
        if self.disposed.get() {
            return;
        }
        for atom in &atoms {
            let weak: Weak<dyn Derivation> = self.self_ref.clone();
            atom.add_observer(self.id, weak);
        }
        *self.deps.borrow_mut() = atoms;
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for atom in &deps {
            atom.remove_observer(self.id);
        }
    }
}

impl Derivation for ReactionInner {
    fn derivation_id(&self) -> u64 {
        self.id
    }

    fn on_became_stale(&self) {
        if self.disposed.get() || self.scheduled.replace(true) {
            return;
        }
        if let Some(me) = self.self_ref.upgrade() {
            self.runtime.schedule(me);
        }
    }
}

impl Scheduled for ReactionInner {
    fn run_scheduled(&self) {
        self.scheduled.set(false);
        self.run();
    }

    fn cancel_scheduled(&self) {
        self.scheduled.set(false);
    }
}

/// Handle to a running side effect.
pub struct Reaction {
    inner: Rc<ReactionInner>,
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.inner.name)
            .field("runs", &self.inner.runs.get())
            .field("dependencies", &self.dependency_count())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Reaction {
    /// Create a reaction and run `effect` once right away.
    pub fn new(runtime: &Runtime, name: impl Into<String>, effect: impl FnMut() + 'static) -> Self {
        let id = runtime.next_id();
        let inner = Rc::new_cyclic(|self_ref| ReactionInner {
            id,
            name: name.into(),
            runtime: runtime.clone(),
            effect: RefCell::new(Box::new(effect)),
            deps: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            disposed: Cell::new(false),
            runs: Cell::new(0),
            self_ref: self_ref.clone(),
        });
        inner.run();
        Self { inner }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// How many times the effect has run.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Distinct atoms read during the last run.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Stop reacting. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
