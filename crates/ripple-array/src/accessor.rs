#![forbid(unsafe_code)]

//! Shared index accessors.
//!
//! Every container on a thread shares one [`IndexAccessorPool`]: a
//! monotonically growing range of [`IndexAccessor`]s, one per position,
//! forwarding reads and writes to whichever container they are applied to.
//! Creating a container never installs accessors of its own; a mutation that
//! would push a container past the reserved range grows the pool first.
//!
//! # Invariants
//!
//! 1. The pool never shrinks.
//! 2. `reserve(n)` installs exactly the accessors in `[reserved, n)` and is a
//!    no-op for any `n <= reserved`.
//! 3. Accessor `i` always addresses position `i`.

use std::cell::RefCell;

use ripple_core::Result;

use crate::array::ObservableArray;
use crate::value::Value;

/// Accessors installed up front, before any container needs them.
pub const DEFAULT_RESERVED_ACCESSORS: usize = 1000;

/// Get/set pair bound to one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexAccessor {
    index: usize,
}

impl IndexAccessor {
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }

    /// Observed read of this position on `array`.
    #[must_use]
    pub fn get(self, array: &ObservableArray) -> Option<Value> {
        array.get(self.index)
    }

    /// Assignment to this position on `array`.
    pub fn set(self, array: &ObservableArray, value: impl Into<Value>) -> Result<()> {
        array.set(self.index, value)
    }
}

#[derive(Debug, Default)]
pub struct IndexAccessorPool {
    accessors: Vec<IndexAccessor>,
}

impl IndexAccessorPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reserved(up_to: usize) -> Self {
        let mut pool = Self::new();
        pool.reserve(up_to);
        pool
    }

    /// Install accessors for every position below `up_to` not yet covered.
    /// Returns how many were installed.
    pub fn reserve(&mut self, up_to: usize) -> usize {
        let start = self.accessors.len();
        if up_to <= start {
            return 0;
        }
        self.accessors
            .extend((start..up_to).map(|index| IndexAccessor { index }));
        tracing::trace!(message = "accessor_pool.grow", from = start, to = up_to);
        up_to - start
    }

    /// Number of positions covered.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.accessors.len()
    }

    #[must_use]
    pub fn accessor(&self, index: usize) -> Option<IndexAccessor> {
        self.accessors.get(index).copied()
    }
}

thread_local! {
    static SHARED_POOL: RefCell<IndexAccessorPool> =
        RefCell::new(IndexAccessorPool::with_reserved(DEFAULT_RESERVED_ACCESSORS));
}

/// Grow the shared pool to cover `[0, up_to)`. Returns how many accessors
/// were installed.
pub fn reserve_accessors(up_to: usize) -> usize {
    SHARED_POOL.with(|pool| pool.borrow_mut().reserve(up_to))
}

/// Positions covered by the shared pool.
#[must_use]
pub fn reserved_accessors() -> usize {
    SHARED_POOL.with(|pool| pool.borrow().reserved())
}

/// The shared accessor for `index`, if reserved.
#[must_use]
pub fn shared_accessor(index: usize) -> Option<IndexAccessor> {
    SHARED_POOL.with(|pool| pool.borrow().accessor(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_is_monotonic_and_idempotent() {
        let mut pool = IndexAccessorPool::new();
        assert_eq!(pool.reserve(10), 10);
        assert_eq!(pool.reserve(10), 0);
        assert_eq!(pool.reserve(4), 0);
        assert_eq!(pool.reserved(), 10);
        assert_eq!(pool.reserve(12), 2);
        assert_eq!(pool.reserved(), 12);
    }

    #[test]
    fn accessors_address_their_position() {
        let pool = IndexAccessorPool::with_reserved(5);
        for i in 0..5 {
            assert_eq!(pool.accessor(i).map(IndexAccessor::index), Some(i));
        }
        assert!(pool.accessor(5).is_none());
    }

    #[test]
    fn shared_pool_starts_primed() {
        assert!(reserved_accessors() >= DEFAULT_RESERVED_ACCESSORS);
        assert!(shared_accessor(DEFAULT_RESERVED_ACCESSORS - 1).is_some());
    }

    #[test]
    fn shared_pool_grows_on_request() {
        let before = reserved_accessors();
        let installed = reserve_accessors(before + 3);
        assert_eq!(installed, 3);
        assert_eq!(reserve_accessors(before + 3), 0);
        assert_eq!(reserved_accessors(), before + 3);
    }
}
