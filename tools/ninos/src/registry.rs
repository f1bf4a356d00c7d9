//! Per-test restoration registry.

use crate::callable::Callable;
use crate::errors::NinosError;
use crate::slots::MethodSlots;
use crate::sync::lock;
use std::fmt;
use std::sync::{Arc, Mutex};

/// One installed spy: where it went and what it displaced.
pub(crate) struct Interception {
    pub(crate) target: Arc<dyn MethodSlots>,
    pub(crate) name: String,
    pub(crate) original: Option<Callable>,
}

/// Interceptions made during one test, restored as a batch when it ends.
///
/// A registry is active from [`Registry::begin`] until the first
/// [`Registry::restore_all`]; it is never reopened.
#[derive(Clone)]
pub struct Registry {
    entries: Arc<Mutex<Option<Vec<Interception>>>>,
}

impl Registry {
    pub fn begin() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.entries).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn ensure_active(&self) -> Result<(), NinosError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(NinosError::NoActiveRegistry)
        }
    }

    /// Runs `install` and records `interception` as one step, or does neither
    /// when the registry has already been closed.
    ///
    /// The registry lock is held across `install` so a concurrent
    /// `restore_all` cannot close the registry between the slot swap and its
    /// registration.
    pub(crate) fn install(
        &self,
        interception: Interception,
        install: impl FnOnce(&dyn MethodSlots),
    ) -> Result<(), NinosError> {
        let mut guard = lock(&self.entries);
        let entries = guard.as_mut().ok_or(NinosError::NoActiveRegistry)?;
        install(interception.target.as_ref());
        entries.push(interception);
        Ok(())
    }

    /// Puts every displaced method back, newest interception first, then
    /// closes the registry. Each slot gets its captured original even if
    /// something redefined it after the spy went in.
    ///
    /// Returns the restored slot names in restore order, or `None` when the
    /// registry was already closed. Exactly one caller ever gets `Some`.
    pub fn restore_all(&self) -> Option<Vec<String>> {
        let entries = lock(&self.entries).take()?;
        Some(
            entries
                .into_iter()
                .rev()
                .map(|entry| {
                    entry.target.set(&entry.name, entry.original);
                    entry.name
                })
                .collect(),
        )
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("active", &self.is_active())
            .field("entries", &self.len())
            .finish()
    }
}
