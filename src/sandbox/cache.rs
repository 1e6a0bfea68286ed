//! Generation-scoped module state.
//!
//! A [`Generation`] bundles everything a root reload throws away: the module
//! cache, the globals map, the transformed sources kept for diagnostics and
//! the compiled modules whose functions listeners may still call.
//! Resets replace the whole value instead of clearing it in place.

use std::collections::HashMap;

use rhai::{Dynamic, Map};

use crate::sandbox::runtime::ActiveModule;

/// Exports of successfully loaded modules, keyed by module identifier.
#[derive(Debug, Default, Clone)]
pub struct ModuleCache {
    modules: HashMap<String, Dynamic>,
}

impl ModuleCache {
    /// Create a new empty module cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached exports for `id`.
    pub fn get(&self, id: &str) -> Option<&Dynamic> {
        self.modules.get(id)
    }

    /// Cache the exports of `id`, replacing any previous entry.
    pub fn insert(&mut self, id: impl Into<String>, exports: Dynamic) {
        self.modules.insert(id.into(), exports);
    }

    /// Check if a module is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Identifiers of all cached modules, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get the number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// State that lives from one reset to the next.
#[derive(Debug, Default)]
pub struct Generation {
    /// Monotonic generation number, starting at 0.
    pub number: u64,
    /// Loaded module exports.
    pub cache: ModuleCache,
    /// Values injected into every module loaded from now on.
    pub globals: Map,
    /// Transformed source text by resolved path.
    pub sources: HashMap<String, String>,
    /// Every module compiled this generation, in load order.
    pub(crate) scripts: Vec<ActiveModule>,
}

impl Generation {
    /// The empty generation that follows this one.
    pub fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            ..Self::default()
        }
    }
}
