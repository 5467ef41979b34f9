//! State controller - pairs one backend with one state cache.

use crate::backend::{Backend, BackendSettings};
use crate::binding::AccessBinding;
use crate::cache::StateCache;
use crate::error::Result;
use std::collections::HashSet;

/// Owner of the persisted-state lifecycle.
///
/// Callers never touch the backend directly: every open, save and close goes
/// through the cache operations exposed here.
pub struct StateController {
    backend: Box<dyn Backend>,
    cache: StateCache,
}

impl StateController {
    /// Wrap an already constructed backend.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            cache: StateCache::new(),
        }
    }

    /// Build the backend selected by configuration.
    pub fn from_settings(settings: &BackendSettings) -> Self {
        log::debug!("Using the '{}' state backend", settings.kind());
        Self::new(settings.build())
    }

    /// Name of the backend variant in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Hydrate the cache from the backend.
    pub fn load(&mut self) -> Result<()> {
        self.cache.load(self.backend.as_mut())
    }

    /// Persist the cache and release the backend.
    pub fn flush_and_close(&mut self) -> Result<()> {
        self.cache.flush_and_close(self.backend.as_mut())
    }

    /// Release the backend without saving. The cache is kept.
    pub fn close(&mut self) {
        self.backend.close();
    }

    /// Cache one binding.
    pub fn add(&mut self, binding: AccessBinding) {
        self.cache.add(binding);
    }

    /// Cache several bindings.
    pub fn add_all<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = AccessBinding>,
    {
        self.cache.add_all(bindings);
    }

    /// Copy of the cached bindings.
    pub fn bindings(&self) -> HashSet<AccessBinding> {
        self.cache.bindings()
    }

    /// Empty the cache; the backend is untouched.
    pub fn reset(&mut self) {
        self.cache.reset();
    }

    /// Number of cached bindings.
    pub fn size(&self) -> usize {
        self.cache.size()
    }

    /// Whether the cache was loaded from the backend.
    pub fn is_loaded(&self) -> bool {
        self.cache.is_loaded()
    }
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("backend", &self.backend.name())
            .field("cache", &self.cache)
            .finish()
    }
}
