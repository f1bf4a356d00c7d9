//! Per-test setup and teardown of stubs and spies.
//!
//! [`Lifecycle::begin_test`] hands each test a [`Doubles`] bound to a fresh
//! [`Registry`]; [`Lifecycle::end_test`] restores every spied method and
//! closes that registry. Nothing here is process-wide, so tests running in
//! parallel never see each other's registries.

use crate::callable::{Callable, Thrown};
use crate::config::{load_config, NinosConfig};
use crate::errors::NinosError;
use crate::interceptor::Interceptor;
use crate::logging::{call_record_payload, JsonlLogger};
use crate::record::CallRecord;
use crate::recorder::{RecordObserver, Stub};
use crate::registry::Registry;
use crate::slots::MethodSlots;
use serde_json::{json, Value};
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

/// Stub and spy factory for one test.
#[derive(Clone)]
pub struct Doubles {
    title: Arc<str>,
    registry: Registry,
    interceptor: Interceptor,
    logger: Option<Arc<JsonlLogger>>,
    record_calls: bool,
}

impl Doubles {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_active(&self) -> bool {
        self.registry.is_active()
    }

    pub fn stub(&self, inner: Option<Callable>) -> Stub {
        Stub::build(
            inner.unwrap_or_else(Callable::noop),
            None,
            self.observer("stub"),
        )
    }

    pub fn stub_fn<F>(&self, f: F) -> Stub
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.stub(Some(Callable::new(f)))
    }

    pub fn spy<T>(
        &self,
        target: &T,
        name: &str,
        replacement: Option<Callable>,
    ) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
    {
        let stub = self
            .interceptor
            .clone()
            .with_observer(self.observer(name))
            .intercept(&self.registry, target, name, replacement)?;
        self.log_installed(name, &stub);
        Ok(stub)
    }

    pub fn spy_with<T, F>(&self, target: &T, name: &str, factory: F) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
        F: FnOnce(Option<Callable>) -> Callable,
    {
        let stub = self
            .interceptor
            .clone()
            .with_observer(self.observer(name))
            .intercept_with(&self.registry, target, name, factory)?;
        self.log_installed(name, &stub);
        Ok(stub)
    }

    fn observer(&self, label: &str) -> Option<RecordObserver> {
        if !self.record_calls {
            return None;
        }
        let logger = Arc::clone(self.logger.as_ref()?);
        let label = label.to_string();
        let title = Arc::clone(&self.title);
        Some(Arc::new(move |record: &CallRecord| {
            let mut payload = call_record_payload(&label, record);
            payload["test"] = json!(&*title);
            logger.info("call_recorded", payload);
        }))
    }

    fn log_installed(&self, name: &str, stub: &Stub) {
        if let Some(logger) = &self.logger {
            logger.info(
                "spy_installed",
                json!({
                    "test": &*self.title,
                    "method": name,
                    "had_original": stub.original().is_some(),
                }),
            );
        }
    }

    /// Restores this test's spies and closes its registry.
    fn finish(&self) -> usize {
        let Some(restored) = self.registry.restore_all() else {
            return 0;
        };
        if let Some(logger) = &self.logger {
            for name in &restored {
                logger.info(
                    "spy_restored",
                    json!({ "test": &*self.title, "method": name }),
                );
            }
            logger.info(
                "test_end",
                json!({ "test": &*self.title, "restored": restored.len() }),
            );
        }
        restored.len()
    }
}

impl fmt::Debug for Doubles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doubles")
            .field("title", &self.title)
            .field("registry", &self.registry)
            .finish()
    }
}

/// The per-test object a host runner owns and passes to its hooks.
#[derive(Debug, Default)]
pub struct TestContext {
    pub title: String,
    doubles: Option<Doubles>,
}

impl TestContext {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            doubles: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.doubles.as_ref().is_some_and(Doubles::is_active)
    }

    pub fn doubles(&self) -> Result<&Doubles, NinosError> {
        self.doubles
            .as_ref()
            .filter(|d| d.is_active())
            .ok_or(NinosError::NoActiveRegistry)
    }

    pub fn stub(&self, inner: Option<Callable>) -> Result<Stub, NinosError> {
        Ok(self.doubles()?.stub(inner))
    }

    pub fn stub_fn<F>(&self, f: F) -> Result<Stub, NinosError>
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        Ok(self.doubles()?.stub_fn(f))
    }

    pub fn spy<T>(
        &self,
        target: &T,
        name: &str,
        replacement: Option<Callable>,
    ) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
    {
        self.doubles()?.spy(target, name, replacement)
    }

    pub fn spy_with<T, F>(&self, target: &T, name: &str, factory: F) -> Result<Stub, NinosError>
    where
        T: MethodSlots + Clone + 'static,
        F: FnOnce(Option<Callable>) -> Callable,
    {
        self.doubles()?.spy_with(target, name, factory)
    }
}

/// Creates and tears down per-test [`Doubles`].
#[derive(Clone, Default)]
pub struct Lifecycle {
    config: Arc<NinosConfig>,
    logger: Option<Arc<JsonlLogger>>,
}

impl Lifecycle {
    pub fn new(config: NinosConfig) -> Self {
        let logger = config.logging.path.as_ref().map(|path| {
            let mut logger = JsonlLogger::new(path);
            logger.max_payload_bytes = config.logging.max_payload_bytes;
            Arc::new(logger)
        });
        Self {
            config: Arc::new(config),
            logger,
        }
    }

    pub fn from_config_file(path: Option<&Path>) -> Result<Self, NinosError> {
        Ok(Self::new(load_config(path)?))
    }

    pub fn config(&self) -> &NinosConfig {
        &self.config
    }

    /// A fresh, active [`Doubles`] for the test named `title`.
    pub fn doubles(&self, title: &str) -> Doubles {
        if let Some(logger) = &self.logger {
            logger.info("test_begin", json!({ "test": title }));
        }
        Doubles {
            title: Arc::from(title),
            registry: Registry::begin(),
            interceptor: Interceptor::new(self.config.spy.allow_absent_method),
            logger: self.logger.clone(),
            record_calls: self.config.logging.record_calls,
        }
    }

    /// Idle -> Active. A context still holding an earlier test's doubles has
    /// them restored first.
    pub fn begin_test(&self, ctx: &mut TestContext) {
        if let Some(stale) = ctx.doubles.take() {
            stale.finish();
        }
        ctx.doubles = Some(self.doubles(&ctx.title));
    }

    /// Active -> Idle. Returns how many spies were restored.
    pub fn end_test(&self, ctx: &mut TestContext) -> usize {
        ctx.doubles.take().map_or(0, |doubles| doubles.finish())
    }

    /// Doubles that restore themselves when dropped.
    pub fn sandbox(&self, title: &str) -> Sandbox {
        Sandbox {
            doubles: self.doubles(title),
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("config", &self.config)
            .field("logging", &self.logger.is_some())
            .finish()
    }
}

/// Scope guard over a test's [`Doubles`]; restores on drop.
#[derive(Debug)]
pub struct Sandbox {
    doubles: Doubles,
}

impl Sandbox {
    /// Restores now instead of at drop.
    pub fn restore(self) -> usize {
        self.doubles.finish()
    }
}

impl Deref for Sandbox {
    type Target = Doubles;

    fn deref(&self) -> &Doubles {
        &self.doubles
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.doubles.finish();
    }
}

pub type Hook = Box<dyn Fn(&mut TestContext) + Send + Sync>;

/// Registration points a host test runner offers.
pub trait TestHooks {
    fn before_each(&mut self, hook: Hook);
    fn after_each(&mut self, hook: Hook);
}

impl<H: TestHooks + ?Sized> TestHooks for &mut H {
    fn before_each(&mut self, hook: Hook) {
        (**self).before_each(hook);
    }

    fn after_each(&mut self, hook: Hook) {
        (**self).after_each(hook);
    }
}

/// Registers begin/end callbacks on `hooks` and hands it back.
pub fn install<H: TestHooks>(mut hooks: H, lifecycle: Lifecycle) -> H {
    let begin = lifecycle.clone();
    hooks.before_each(Box::new(move |ctx: &mut TestContext| begin.begin_test(ctx)));
    hooks.after_each(Box::new(move |ctx: &mut TestContext| {
        lifecycle.end_test(ctx);
    }));
    hooks
}
