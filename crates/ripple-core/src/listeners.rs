#![forbid(unsafe_code)]

//! Listener and interceptor registration.
//!
//! [`Listeners<E>`] broadcasts events after a change; [`Interceptors<C>`]
//! threads a proposed change through handlers before it is applied. Both
//! store their callbacks as `Weak` pointers: the [`Subscription`] returned on
//! registration owns the only strong reference, so dropping it unregisters
//! the callback. Dead slots are cleaned up lazily on the next dispatch.
//!
//! # Invariants
//!
//! 1. Callbacks run in registration order.
//! 2. Dispatch works on a snapshot, so callbacks may register, drop
//!    subscriptions or trigger further dispatches reentrantly.
//! 3. Dropping a [`Subscription`] removes the callback before the next
//!    dispatch cycle.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// RAII guard for a registered listener or interceptor.
///
/// The callback stays registered for as long as this value lives.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    _keep_alive: Box<dyn Any>,
}

impl Subscription {
    fn new(keep_alive: Box<dyn Any>) -> Self {
        Self {
            _keep_alive: keep_alive,
        }
    }

    /// Unregister the callback now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

type Callback<E> = dyn Fn(&E);

/// Post-change event broadcaster.
pub struct Listeners<E> {
    slots: RefCell<Vec<Weak<Callback<E>>>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("live", &self.len())
            .finish()
    }
}

impl<E: 'static> Listeners<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; it stays registered while the returned
    /// subscription lives.
    pub fn on(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let callback: Rc<Callback<E>> = Rc::new(listener);
        self.slots.borrow_mut().push(Rc::downgrade(&callback));
        Subscription::new(Box::new(callback))
    }

    /// Deliver `event` to every live listener.
    pub fn emit(&self, event: &E) {
        let live: Vec<Rc<Callback<E>>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|weak| weak.strong_count() > 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(event);
        }
    }
}

impl<E> Listeners<E> {
    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Handler<C> = dyn Fn(C) -> Option<C>;

/// Pre-change hook chain. A handler may rewrite the change or return `None`
/// to cancel it.
pub struct Interceptors<C> {
    slots: RefCell<Vec<Weak<Handler<C>>>>,
}

impl<C> Default for Interceptors<C> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }
}

impl<C> fmt::Debug for Interceptors<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("live", &self.len())
            .finish()
    }
}

impl<C: 'static> Interceptors<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intercept(&self, handler: impl Fn(C) -> Option<C> + 'static) -> Subscription {
        let handler: Rc<Handler<C>> = Rc::new(handler);
        self.slots.borrow_mut().push(Rc::downgrade(&handler));
        Subscription::new(Box::new(handler))
    }

    /// Pass `change` through every live handler. `None` means cancelled.
    pub fn run(&self, change: C) -> Option<C> {
        let live: Vec<Rc<Handler<C>>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|weak| weak.strong_count() > 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };
        live.into_iter().try_fold(change, |change, handler| handler(change))
    }
}

impl<C> Interceptors<C> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
