//! Named method slots that spies can swap.

use crate::callable::{Callable, Thrown};
use crate::sync::lock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Get/set access to named callable slots on a shared object.
///
/// `set(name, None)` removes the slot.
///
/// Installing a spy calls `set` while the test's [`crate::Registry`] is
/// locked, so `set` must not spy, restore, or otherwise touch that registry
/// during installation; doing so deadlocks. Restoration calls `set` with the
/// lock released.
pub trait MethodSlots: Send + Sync {
    fn get(&self, name: &str) -> Option<Callable>;
    fn set(&self, name: &str, method: Option<Callable>);
}

/// A shared mutable object whose methods are looked up at call time.
///
/// Cloning yields another handle to the same object, so a method swapped
/// through one handle is seen through all of them.
#[derive(Clone, Default)]
pub struct Object {
    receiver: Option<Value>,
    methods: Arc<Mutex<BTreeMap<String, Callable>>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// An object whose plain [`Object::call`] binds `receiver` as the
    /// calling context.
    pub fn with_receiver(receiver: Value) -> Self {
        Self {
            receiver: Some(receiver),
            ..Self::default()
        }
    }

    pub fn with_method(self, name: &str, method: Callable) -> Self {
        self.define(name, method);
        self
    }

    pub fn define(&self, name: &str, method: Callable) {
        lock(&self.methods).insert(name.to_string(), method);
    }

    pub fn method(&self, name: &str) -> Option<Callable> {
        lock(&self.methods).get(name).cloned()
    }

    pub fn has_method(&self, name: &str) -> bool {
        lock(&self.methods).contains_key(name)
    }

    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    pub fn call(&self, name: &str, arguments: &[Value]) -> Result<Value, Thrown> {
        self.call_with(name, self.receiver.as_ref(), arguments)
    }

    /// Looks `name` up now and invokes it with an explicit receiver.
    pub fn call_with(
        &self,
        name: &str,
        receiver: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Value, Thrown> {
        let method = self
            .method(name)
            .ok_or_else(|| Thrown::msg(format!("`{name}` is not a function")))?;
        method.call(receiver, arguments)
    }
}

impl MethodSlots for Object {
    fn get(&self, name: &str) -> Option<Callable> {
        self.method(name)
    }

    fn set(&self, name: &str, method: Option<Callable>) {
        let mut methods = lock(&self.methods);
        match method {
            Some(method) => {
                methods.insert(name.to_string(), method);
            }
            None => {
                methods.remove(name);
            }
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = lock(&self.methods).keys().cloned().collect();
        f.debug_struct("Object")
            .field("receiver", &self.receiver)
            .field("methods", &names)
            .finish()
    }
}
