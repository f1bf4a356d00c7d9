//! Call records and the append-only call log.

use crate::callable::Thrown;
use crate::sync::lock;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// How a recorded invocation ended. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Returned(Value),
    Threw(Thrown),
}

impl Outcome {
    pub fn returned(&self) -> Option<&Value> {
        match self {
            Self::Returned(value) => Some(value),
            Self::Threw(_) => None,
        }
    }

    pub fn threw(&self) -> Option<&Thrown> {
        match self {
            Self::Returned(_) => None,
            Self::Threw(err) => Some(err),
        }
    }

    pub fn is_returned(&self) -> bool {
        matches!(self, Self::Returned(_))
    }

    pub fn is_threw(&self) -> bool {
        matches!(self, Self::Threw(_))
    }
}

/// One invocation of a stub or spy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub receiver: Option<Value>,
    pub arguments: Vec<Value>,
    pub outcome: Outcome,
}

impl CallRecord {
    pub fn returned(receiver: Option<Value>, arguments: Vec<Value>, value: Value) -> Self {
        Self {
            receiver,
            arguments,
            outcome: Outcome::Returned(value),
        }
    }

    pub fn threw(receiver: Option<Value>, arguments: Vec<Value>, error: Thrown) -> Self {
        Self {
            receiver,
            arguments,
            outcome: Outcome::Threw(error),
        }
    }
}

/// Ordered log owned by one recorder. Clones observe the same log.
///
/// Records are only ever appended; readers get copies.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    pub(crate) fn push(&self, record: CallRecord) {
        lock(&self.records).push(record);
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn get(&self, index: usize) -> Option<CallRecord> {
        lock(&self.records).get(index).cloned()
    }

    pub fn last(&self) -> Option<CallRecord> {
        lock(&self.records).last().cloned()
    }

    pub fn snapshot(&self) -> Vec<CallRecord> {
        lock(&self.records).clone()
    }
}
