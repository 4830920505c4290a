#![forbid(unsafe_code)]

//! Observable arrays.
//!
//! An [`ObservableArray`] behaves like an ordered, growable sequence whose
//! reads are tracked by a [`Runtime`](ripple_core::Runtime) and whose
//! mutations produce [`ArrayChange`] records. Every structural mutation
//! funnels into a single splice primitive on the [`ArrayAdministration`].
//!
//! ```ignore
//! let rt = Runtime::new();
//! let xs = ObservableArray::new(&rt, [Value::from(1)], WrapMode::Recursive, "xs")?;
//! let _sub = xs.observe(|change| println!("{:?}", change.kind()), false);
//! xs.push(2)?;
//! ```

pub mod accessor;
pub mod admin;
pub mod array;
pub mod change;
pub mod mode;
pub mod plain;
pub mod value;

pub use accessor::{
    DEFAULT_RESERVED_ACCESSORS, IndexAccessor, IndexAccessorPool, reserve_accessors,
    reserved_accessors, shared_accessor,
};
pub use admin::ArrayAdministration;
pub use array::{ArrayOptions, ObservableArray};
pub use change::{ArrayChange, ArraySplice, ArrayUpdate, ArrayWillChange, ChangeKind};
pub use mode::{EnhanceContext, Enhancer, WrapMode};
pub use plain::to_plain;
pub use value::{Modifier, Value};
