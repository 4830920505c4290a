#![forbid(unsafe_code)]

//! Core: tracking runtime, atoms, derivations and listener plumbing.
//!
//! - [`Runtime`]: explicit, shareable tracking context (derivation stack,
//!   batching, modification guard).
//! - [`Atom`]: value-less dependency-tracking primitive.
//! - [`Reaction`] and [`Computed`]: derivations that re-run or recompute
//!   when the atoms they read change.
//! - [`Listeners`], [`Interceptors`] and [`Subscription`]: change-event
//!   registration.

pub mod atom;
pub mod computed;
pub mod config;
pub mod error;
pub mod listeners;
pub mod reaction;
pub mod runtime;

pub use atom::{Atom, Derivation};
pub use computed::Computed;
pub use config::RuntimeConfig;
pub use error::{Result, UsageError};
pub use listeners::{Interceptors, Listeners, Subscription};
pub use reaction::Reaction;
pub use runtime::{Observations, Runtime};
