//! In-memory cache of applied bindings.

use crate::backend::Backend;
use crate::binding::AccessBinding;
use crate::error::Result;
use std::collections::HashSet;

/// Collection tag written with every flush.
pub const STORE_TYPE: &str = "acls";

/// Deduplicated set of bindings mirroring a backend's content.
///
/// The cache never owns a backend: the state controller hands one in for
/// `load` and `flush_and_close`.
#[derive(Debug, Default, Clone)]
pub struct StateCache {
    bindings: HashSet<AccessBinding>,
    loaded: bool,
}

impl StateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one binding. Already-present bindings are absorbed.
    pub fn add(&mut self, binding: AccessBinding) {
        log::debug!("Adding binding {binding} to the state cache");
        self.bindings.insert(binding);
    }

    /// Insert many bindings.
    pub fn add_all<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = AccessBinding>,
    {
        let before = self.bindings.len();
        self.bindings.extend(bindings);
        log::debug!(
            "Added {} new bindings to the state cache",
            self.bindings.len() - before
        );
    }

    /// Copy of the current bindings.
    pub fn bindings(&self) -> HashSet<AccessBinding> {
        self.bindings.clone()
    }

    /// Whether the binding is cached.
    pub fn contains(&self, binding: &AccessBinding) -> bool {
        self.bindings.contains(binding)
    }

    /// Open the backend and merge its content into the cache.
    pub fn load(&mut self, backend: &mut dyn Backend) -> Result<()> {
        log::debug!("Loading state from the {} backend", backend.name());
        backend.create_or_open()?;
        let stored = backend.load()?;
        self.bindings.extend(stored);
        self.loaded = true;
        Ok(())
    }

    /// Persist the full cache and close the backend.
    ///
    /// Always runs `create_or_open`, `save_type`, `save_bindings`, `close`
    /// in that order. `close` still runs when a save fails.
    pub fn flush_and_close(&self, backend: &mut dyn Backend) -> Result<()> {
        log::debug!(
            "Flushing {} '{STORE_TYPE}' entries to the {} backend",
            self.bindings.len(),
            backend.name()
        );
        backend.create_or_open()?;
        let saved = backend
            .save_type(STORE_TYPE)
            .and_then(|()| backend.save_bindings(&self.bindings));
        backend.close();
        saved
    }

    /// Drop every cached binding without touching any backend.
    pub fn reset(&mut self) {
        log::debug!("Reset the bindings cache");
        self.bindings.clear();
    }

    /// Number of distinct bindings.
    pub fn size(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the cache holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether `load` has succeeded at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
