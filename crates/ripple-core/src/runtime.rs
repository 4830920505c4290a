#![forbid(unsafe_code)]

//! The tracking runtime: an explicit context shared by atoms, derivations and
//! containers.
//!
//! # Design
//!
//! A [`Runtime`] is a cheaply cloneable, single-threaded handle
//! (`Rc<..>` inside). It owns four pieces of state:
//!
//! - a stack of tracking frames, one per running derivation, into which
//!   [`Atom::report_observed`] records observations;
//! - a stack of "state changes allowed" flags, pushed by actions (allowed)
//!   and by computed evaluation (disallowed);
//! - the batch depth and the queue of reactions waiting for the outermost
//!   batch to end;
//! - the [`RuntimeConfig`] it was created with.
//!
//! Nothing here is global: two runtimes never see each other's derivations
//! or guard state.
//!
//! # Invariants
//!
//! 1. Every push onto the frame or allow stack is popped on scope exit, also
//!    when the scoped closure unwinds.
//! 2. Pending reactions only run when the batch depth returns to zero.
//! 3. A reaction is queued at most once per round.
//! 4. The reaction loop never runs more than `max_reaction_iterations`
//!    rounds per outermost batch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;
use crate::config::RuntimeConfig;
use crate::error::{Result, UsageError};

/// Something the runtime can run once the current batch settles.
pub(crate) trait Scheduled {
    fn run_scheduled(&self);
    fn cancel_scheduled(&self);
}

/// Observations reported while a tracked closure ran, in report order.
///
/// The same atom appears once per report, so `len()` counts reads rather
/// than distinct dependencies.
#[derive(Clone, Default)]
pub struct Observations {
    atoms: Vec<Atom>,
}

impl Observations {
    /// Number of observations reported (with multiplicity).
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// How many times `atom` was observed.
    #[must_use]
    pub fn count_of(&self, atom: &Atom) -> usize {
        self.atoms.iter().filter(|a| a.ptr_eq(atom)).count()
    }

    /// Whether `atom` was observed at least once.
    #[must_use]
    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.iter().any(|a| a.ptr_eq(atom))
    }

    /// Distinct atoms, in first-observed order.
    #[must_use]
    pub fn distinct(&self) -> Vec<Atom> {
        let mut out: Vec<Atom> = Vec::with_capacity(self.atoms.len());
        for atom in &self.atoms {
            if !out.iter().any(|seen| seen.ptr_eq(atom)) {
                out.push(atom.clone());
            }
        }
        out
    }

    /// Diagnostic names of every observation, in report order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.name().to_owned()).collect()
    }
}

impl fmt::Debug for Observations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Default)]
struct RuntimeState {
    /// `None` marks an untracked region.
    frames: Vec<Option<Observations>>,
    allow: Vec<bool>,
    batch_depth: usize,
    pending: Vec<Rc<dyn Scheduled>>,
    running_reactions: bool,
}

struct RuntimeInner {
    config: RuntimeConfig,
    state: RefCell<RuntimeState>,
    next_id: Cell<u64>,
}

/// Shared tracking context.
///
/// Cloning a `Runtime` creates a new handle to the **same** context.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("tracking_depth", &state.frames.len())
            .field("batch_depth", &state.batch_depth)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                state: RefCell::new(RuntimeState::default()),
                next_id: Cell::new(1),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    /// Allocate a runtime-unique id (used for default diagnostic names).
    pub fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Tracking ─────────────────────────────────────────────────────

    /// Whether a derivation is currently collecting observations.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        matches!(self.inner.state.borrow().frames.last(), Some(Some(_)))
    }

    /// Run `f` under a fresh tracking frame and return what it observed.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> (R, Observations) {
        self.inner
            .state
            .borrow_mut()
            .frames
            .push(Some(Observations::default()));
        let guard = FrameGuard {
            runtime: self,
            armed: true,
        };
        let result = f();
        let observations = guard.finish();
        (result, observations)
    }

    /// Run `f` without recording any observation.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.state.borrow_mut().frames.push(None);
        let _guard = FrameGuard {
            runtime: self,
            armed: true,
        };
        f()
    }

    pub(crate) fn record_observation(&self, atom: &Atom) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match state.frames.last_mut() {
            Some(Some(frame)) => {
                frame.atoms.push(atom.clone());
                true
            }
            _ => false,
        }
    }

    fn pop_frame(&self) -> Observations {
        self.inner
            .state
            .borrow_mut()
            .frames
            .pop()
            .flatten()
            .unwrap_or_default()
    }

    // ── Modification guard ───────────────────────────────────────────

    /// Whether state may be modified at this point.
    #[must_use]
    pub fn modifications_allowed(&self) -> bool {
        self.inner
            .state
            .borrow()
            .allow
            .last()
            .copied()
            .unwrap_or(!self.inner.config.enforce_actions)
    }

    /// Fail with [`UsageError::ModificationNotAllowed`] when state may not be
    /// modified right now.
    pub fn check_modification_allowed(&self, name: &str) -> Result<()> {
        if self.modifications_allowed() {
            return Ok(());
        }
        tracing::warn!(message = "runtime.modification_rejected", name);
        Err(UsageError::not_allowed(name))
    }

    /// Run `f` with the modification flag set to `allowed`.
    pub fn allow_state_changes<R>(&self, allowed: bool, f: impl FnOnce() -> R) -> R {
        self.inner.state.borrow_mut().allow.push(allowed);
        let _guard = AllowGuard { runtime: self };
        f()
    }

    // ── Batching ─────────────────────────────────────────────────────

    #[must_use]
    pub fn batch_depth(&self) -> usize {
        self.inner.state.borrow().batch_depth
    }

    /// Number of reactions waiting for the outermost batch to end.
    #[must_use]
    pub fn pending_reactions(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    /// Run `f` inside a batch. Reactions invalidated by `f` run once, after
    /// the outermost batch ends.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.state.borrow_mut().batch_depth += 1;
        let _guard = BatchGuard { runtime: self };
        f()
    }

    /// Run `f` as a named action: batched, with modifications allowed.
    pub fn action<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let span = tracing::debug_span!("action", name);
        let _enter = span.enter();
        self.batch(|| self.allow_state_changes(true, f))
    }

    pub(crate) fn schedule(&self, reaction: Rc<dyn Scheduled>) {
        self.inner.state.borrow_mut().pending.push(reaction);
    }

    fn end_batch(&self) {
        let run = {
            let mut state = self.inner.state.borrow_mut();
            state.batch_depth = state.batch_depth.saturating_sub(1);
            state.batch_depth == 0 && !state.running_reactions
        };
        if run && !std::thread::panicking() {
            self.run_pending_reactions();
        }
    }

    fn run_pending_reactions(&self) {
        self.inner.state.borrow_mut().running_reactions = true;
        let limit = self.inner.config.max_reaction_iterations;
        let mut rounds = 0usize;
        loop {
            let round = std::mem::take(&mut self.inner.state.borrow_mut().pending);
            if round.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > limit {
                tracing::error!(
                    message = "runtime.reactions_diverged",
                    limit,
                    dropped = round.len()
                );
                for reaction in round {
                    reaction.cancel_scheduled();
                }
                let rest = std::mem::take(&mut self.inner.state.borrow_mut().pending);
                for reaction in rest {
                    reaction.cancel_scheduled();
                }
                break;
            }
            for reaction in round {
                reaction.run_scheduled();
            }
        }
        self.inner.state.borrow_mut().running_reactions = false;
    }
}

struct FrameGuard<'a> {
    runtime: &'a Runtime,
    armed: bool,
}

impl FrameGuard<'_> {
    fn finish(mut self) -> Observations {
        self.armed = false;
        self.runtime.pop_frame()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.runtime.pop_frame();
        }
    }
}

struct AllowGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for AllowGuard<'_> {
    fn drop(&mut self) {
        self.runtime.inner.state.borrow_mut().allow.pop();
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.runtime.end_batch();
    }
}
