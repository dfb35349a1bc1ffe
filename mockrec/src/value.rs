// vim: tw=80
//! Type-erased values flowing through the engine: call arguments, canned
//! return values and stubbed errors.

use downcast::*;
use std::{fmt, sync::Arc};

/// Any value that can be passed to, or returned from, a mocked method.
///
/// Implemented automatically for every `'static` type that is `Debug`,
/// `PartialEq`, `Send` and `Sync`.  Literal arguments are compared with
/// [`dyn_eq`](#tymethod.dyn_eq), which is `false` whenever the two values have
/// different concrete types.
pub trait Value: Any + fmt::Debug + Send + Sync {
    /// Value equality across type-erased values.
    fn dyn_eq(&self, other: &dyn Value) -> bool;
}
downcast!(dyn Value);

impl<T> Value for T
    where T: fmt::Debug + PartialEq + Send + Sync + 'static
{
    fn dyn_eq(&self, other: &dyn Value) -> bool {
        match other.downcast_ref::<T>() {
            Ok(o) => self == o,
            Err(_) => false
        }
    }
}

/// A shared, type-erased [`Value`].
pub type AnyValue = Arc<dyn Value>;

/// Erase a concrete value.
pub fn value<T: Value>(v: T) -> AnyValue {
    Arc::new(v)
}

/// Recover a concrete clone of a type-erased value, if it has type `T`.
pub fn cloned<T: Value + Clone>(v: &dyn Value) -> Option<T> {
    v.downcast_ref::<T>().ok().cloned()
}
