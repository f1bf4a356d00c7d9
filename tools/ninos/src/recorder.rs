//! Recording wrapper around an arbitrary callable.

use crate::callable::{Callable, Thrown};
use crate::record::{CallLog, CallRecord, Outcome};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) type RecordObserver = Arc<dyn Fn(&CallRecord) + Send + Sync>;

/// A callable that logs every invocation before handing back the wrapped
/// callable's result.
///
/// Clones share the same log and the same installed [`Callable`].
///
/// Only `Ok` and `Err` from the wrapped callable are outcomes. A panic
/// inside it unwinds through the stub and leaves no record.
#[derive(Clone)]
pub struct Stub {
    callable: Callable,
    calls: CallLog,
    original: Option<Callable>,
}

/// Wraps `inner` (or a no-op when `None`) in a recording [`Stub`].
pub fn create_recorder(inner: Option<Callable>) -> Stub {
    Stub::build(inner.unwrap_or_else(Callable::noop), None, None)
}

impl Stub {
    pub fn new(inner: Callable) -> Self {
        Self::build(inner, None, None)
    }

    pub fn noop() -> Self {
        Self::build(Callable::noop(), None, None)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        Self::build(Callable::new(f), None, None)
    }

    pub(crate) fn build(
        inner: Callable,
        original: Option<Callable>,
        observer: Option<RecordObserver>,
    ) -> Self {
        let calls = CallLog::default();
        let log = calls.clone();
        let callable = Callable::new(move |receiver, arguments| {
            // The log lock is not held here: `inner` may read its own log.
            let result = inner.call(receiver, arguments);
            let outcome = match &result {
                Ok(value) => Outcome::Returned(value.clone()),
                Err(err) => Outcome::Threw(err.clone()),
            };
            let record = CallRecord {
                receiver: receiver.cloned(),
                arguments: arguments.to_vec(),
                outcome,
            };
            if let Some(observer) = &observer {
                observer(&record);
            }
            log.push(record);
            result
        });
        Self {
            callable,
            calls,
            original,
        }
    }

    pub fn call(&self, receiver: Option<&Value>, arguments: &[Value]) -> Result<Value, Thrown> {
        self.callable.call(receiver, arguments)
    }

    /// The handle that records into this stub's log; spies install this one.
    pub fn callable(&self) -> Callable {
        self.callable.clone()
    }

    pub fn log(&self) -> &CallLog {
        &self.calls
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.snapshot()
    }

    /// The method a spy replaced. `None` for plain stubs and for spies
    /// installed over an absent slot.
    pub fn original(&self) -> Option<&Callable> {
        self.original.as_ref()
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("callable", &self.callable)
            .field("calls", &self.calls.len())
            .field("original", &self.original)
            .finish()
    }
}
