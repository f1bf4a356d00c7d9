//! Method interception: swap a named slot for a recording stub and register
//! the swap for restoration.

use crate::callable::Callable;
use crate::errors::NinosError;
use crate::recorder::{RecordObserver, Stub};
use crate::registry::{Interception, Registry};
use crate::slots::MethodSlots;
use std::sync::Arc;

/// Settings shared by every spy a [`crate::lifecycle::Doubles`] installs.
#[derive(Clone)]
pub struct Interceptor {
    allow_absent_method: bool,
    observer: Option<RecordObserver>,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self {
            allow_absent_method: true,
            observer: None,
        }
    }
}

impl Interceptor {
    pub fn new(allow_absent_method: bool) -> Self {
        Self {
            allow_absent_method,
            observer: None,
        }
    }

    pub(crate) fn with_observer(mut self, observer: Option<RecordObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub(crate) fn observer(&self) -> Option<RecordObserver> {
        self.observer.clone()
    }

    pub fn intercept<T>(
        &self,
        registry: &Registry,
        target: &T,
        name: &str,
        replacement: Option<Callable>,
    ) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
    {
        let has_replacement = replacement.is_some();
        self.install(registry, target, name, has_replacement, move |original| {
            replacement.or(original)
        })
    }

    /// Like [`Interceptor::intercept`], but `factory` builds the replacement
    /// from the captured original so it can delegate to it.
    pub fn intercept_with<T, F>(
        &self,
        registry: &Registry,
        target: &T,
        name: &str,
        factory: F,
    ) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
        F: FnOnce(Option<Callable>) -> Callable,
    {
        self.install(registry, target, name, true, move |original| {
            Some(factory(original))
        })
    }

    fn install<T, F>(
        &self,
        registry: &Registry,
        target: &T,
        name: &str,
        has_replacement: bool,
        choose_inner: F,
    ) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
        F: FnOnce(Option<Callable>) -> Option<Callable>,
    {
        registry.ensure_active()?;

        let original = target.get(name);
        if original.is_none() {
            if !has_replacement {
                return Err(NinosError::MissingMethod {
                    name: name.to_string(),
                });
            }
            if !self.allow_absent_method {
                return Err(NinosError::AbsentMethodDisallowed {
                    name: name.to_string(),
                });
            }
        }

        let inner = choose_inner(original.clone()).ok_or_else(|| NinosError::MissingMethod {
            name: name.to_string(),
        })?;
        let stub = Stub::build(inner, original.clone(), self.observer());
        let installed = stub.callable();
        let interception = Interception {
            target: Arc::new(target.clone()),
            name: name.to_string(),
            original,
        };
        registry.install(interception, |slots| slots.set(name, Some(installed)))?;
        Ok(stub)
    }
}

/// Spies on `target.name` with the default [`Interceptor`].
pub fn intercept<T>(
    registry: &Registry,
    target: &T,
    name: &str,
    replacement: Option<Callable>,
) -> Result<Stub, NinosError>
where
    T: MethodSlots + Clone + 'static,
{
    Interceptor::default().intercept(registry, target, name, replacement)
}

pub fn intercept_with<T, F>(
    registry: &Registry,
    target: &T,
    name: &str,
    factory: F,
) -> Result<Stub, NinosError>
where
    T: MethodSlots + Clone + 'static,
    F: FnOnce(Option<Callable>) -> Callable,
{
    Interceptor::default().intercept_with(registry, target, name, factory)
}
