//! Fallback loader for trusted host modules.

use std::collections::HashMap;

use rhai::Dynamic;

/// Loads host modules for identifiers that have no sandboxed source.
pub trait NativeModules {
    /// Produce the exports of the host module `id`.
    fn load(&self, id: &str) -> anyhow::Result<Dynamic>;
}

type Factory = Box<dyn Fn() -> anyhow::Result<Dynamic>>;

/// Host modules registered by identifier.
#[derive(Default)]
pub struct NativeRegistry {
    factories: HashMap<String, Factory>,
}

impl NativeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module whose exports are built by `factory` on each load.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Dynamic> + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
        self
    }

    /// Register a module with fixed exports.
    pub fn register_value(&mut self, id: impl Into<String>, exports: Dynamic) -> &mut Self {
        self.register(id, move || Ok(exports.clone()))
    }

    /// Check if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("NativeRegistry").field("modules", &ids).finish()
    }
}

impl NativeModules for NativeRegistry {
    fn load(&self, id: &str) -> anyhow::Result<Dynamic> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("Couldn't find module: {id}"))?;
        factory()
    }
}
