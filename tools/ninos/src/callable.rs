//! Dynamic callables and raised values.
//!
//! Doubles traffic in `serde_json::Value`: a receiver is `Option<Value>`
//! (`None` when the call has no bound context), arguments are a slice of
//! values, and "returned nothing" is `Value::Null`.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

type CallFn = dyn Fn(Option<&Value>, &[Value]) -> Result<Value, Thrown> + Send + Sync;

/// Shared handle to a callable. Clones refer to the same function, and
/// equality is identity.
#[derive(Clone)]
pub struct Callable(Arc<CallFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Accepts any arguments and returns nothing.
    pub fn noop() -> Self {
        Self::new(|_, _| Ok(Value::Null))
    }

    pub fn call(&self, receiver: Option<&Value>, arguments: &[Value]) -> Result<Value, Thrown> {
        (self.0)(receiver, arguments)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Callable {}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Plain-text error used by [`Thrown::msg`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ErrorMessage(pub String);

/// A value raised by a callable.
///
/// Clones share the underlying error, so a recorded `Thrown` and the one
/// handed back to the caller compare equal with [`Thrown::same`].
#[derive(Clone)]
pub struct Thrown(Arc<dyn StdError + Send + Sync>);

impl Thrown {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ErrorMessage(message.into()))
    }

    pub fn same(&self, other: &Thrown) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl PartialEq for Thrown {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Thrown").field(&self.0.to_string()).finish()
    }
}

impl StdError for Thrown {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl Serialize for Thrown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn noop_returns_null_for_any_arguments() {
        let f = Callable::noop();
        assert_eq!(f.call(None, &[]).expect("noop"), Value::Null);
        assert_eq!(
            f.call(Some(&json!("this")), &[json!(1), json!("two")])
                .expect("noop"),
            Value::Null
        );
    }

    #[test]
    fn callable_equality_is_identity() {
        let a = Callable::new(|_, _| Ok(json!(1)));
        let b = Callable::new(|_, _| Ok(json!(1)));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn thrown_clones_share_identity() {
        let err = Thrown::msg("boom");
        let copy = err.clone();
        assert!(err.same(&copy));
        assert!(!err.same(&Thrown::msg("boom")));
        assert_eq!(copy.to_string(), "boom");
    }

    #[test]
    fn thrown_downcasts_to_the_raised_type() {
        #[derive(Debug, Error)]
        #[error("code {0}")]
        struct Coded(u32);

        let err = Thrown::new(Coded(7));
        assert_eq!(err.downcast_ref::<Coded>().map(|c| c.0), Some(7));
        assert!(err.downcast_ref::<ErrorMessage>().is_none());
    }
}
