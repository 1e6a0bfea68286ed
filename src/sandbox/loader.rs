//! The module loader behind `require`.
//!
//! A call walks `cache hit | resolve source -> native fallback | transform and
//! evaluate -> success | failure`. Failures never escape: they are attributed
//! to a file, shown through the exception reporter and `require` yields
//! nothing.

use std::rc::Rc;

use rhai::{Dynamic, Map, Scope};
use tracing::{debug, warn};

use crate::error::{Exception, FailureKind};
use crate::sandbox::runtime::{ActiveModule, Sandbox, StackGuard};
use crate::sandbox::transform::Capabilities;

/// Bindings every module scope starts with; globals never shadow them.
pub const RESERVED_BINDINGS: [&str; 5] = ["module", "exports", "__filename", "__dirname", "__proxy"];

/// Options for [`Sandbox::require`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequireOptions {
    /// Reset the sandbox before loading.
    pub root: bool,
}

impl RequireOptions {
    /// Options for loading a new top-level bundle.
    pub fn root() -> Self {
        Self { root: true }
    }
}

impl Sandbox {
    /// Load module `id` and return its exports.
    ///
    /// Exports are cached per generation: a second call returns the cached
    /// value without reading or evaluating anything. Identifiers without a
    /// `<id>.<script extension>` resource go to the native module loader.
    /// Any failure is reported through [`Sandbox::exception`] and yields
    /// `None`.
    pub fn require(&self, id: &str, options: RequireOptions) -> Option<Dynamic> {
        if options.root {
            if let Err(err) = self.clean() {
                self.report_fatal(&err);
            }
        }

        match self.load(id, options) {
            Ok(exports) => Some(exports),
            Err(exception) => {
                self.exception(&exception);
                None
            }
        }
    }

    /// Shorthand for a root `require`.
    pub fn require_root(&self, id: &str) -> Option<Dynamic> {
        self.require(id, RequireOptions::root())
    }

    fn load(&self, id: &str, options: RequireOptions) -> Result<Dynamic, Exception> {
        if let Some(exports) = self.inner.state.borrow().cache.get(id) {
            debug!("require cache: {id}");
            return Ok(exports.clone());
        }

        let mut filename = None;
        let loaded = self.load_uncached(id, options, &mut filename);
        loaded.map_err(|e| e.or_filename(filename.as_deref().unwrap_or(id)))
    }

    fn load_uncached(
        &self,
        id: &str,
        options: RequireOptions,
        filename: &mut Option<String>,
    ) -> Result<Dynamic, Exception> {
        let inner = &self.inner;
        let generation = self.generation();
        let script = format!("{id}.{}", inner.config.script_extension);

        let Some(path) = inner.resolver.resolve(inner.host.fs.as_ref(), &script) else {
            debug!("require native: {id}");
            let exports = inner
                .host
                .native
                .load(id)
                .map_err(|e| Exception::new(FailureKind::Native, e.to_string()))?;
            self.store(generation, id, exports.clone());
            return Ok(exports);
        };
        *filename = Some(path.clone());

        if inner.loading.borrow().contains(&path) {
            return Err(Exception::new(
                FailureKind::Cycle,
                format!("circular require of '{id}' while it is still loading"),
            ));
        }
        let _loading = StackGuard::push(&inner.loading, path.clone());

        debug!("require script: {id}");
        let source = inner
            .host
            .fs
            .read_text(&path)
            .map_err(|e| Exception::new(FailureKind::Read, e.to_string()))?;

        let capabilities = Capabilities::for_load(options.root);
        let body = inner
            .host
            .transform
            .transform(&source, capabilities)
            .map_err(|e| Exception::new(FailureKind::Transform, format!("{e:#}")))?;

        inner
            .state
            .borrow_mut()
            .sources
            .insert(path.clone(), body.clone());

        let mut ast = inner
            .engine
            .compile(&body)
            .map_err(|e| Exception::from_parse(&e))?;
        ast.set_source(path.as_str());
        let module = ActiveModule {
            ast: Rc::new(ast),
            filename: Rc::from(path.as_str()),
        };
        inner.state.borrow_mut().scripts.push(module.clone());

        let mut scope = self.module_scope(&path);
        let bound = scope.len();
        {
            let _active = StackGuard::push(&inner.active, module.clone());
            inner
                .engine
                .run_ast_with_scope(&mut scope, &module.ast)
                .map_err(Exception::from_eval)?;
        }

        let exports = module_exports(&scope);
        if capabilities.globals && inner.config.capture_root_globals {
            self.capture_globals(generation, &scope, bound);
        }
        self.store(generation, id, exports.clone());
        Ok(exports)
    }

    /// Scope for a module at `path`: reserved bindings, then host bindings,
    /// then a snapshot of the globals map.
    fn module_scope(&self, path: &str) -> Scope<'static> {
        let mut module = Map::new();
        module.insert("exports".into(), Dynamic::from_map(Map::new()));

        let mut scope = Scope::new();
        scope.push("module", module);
        scope.push("exports", Map::new());
        scope.push("__filename", path.to_string());
        scope.push("__dirname", self.inner.resolver.dirname(path).to_string());
        scope.push("__proxy", self.handle());

        let state = self.inner.state.borrow();
        for (name, value) in self.inner.bindings.iter().chain(state.globals.iter()) {
            if RESERVED_BINDINGS.contains(&name.as_str()) {
                warn!(%name, "global would shadow a module binding; skipped");
                continue;
            }
            scope.push_dynamic(name.clone(), value.clone());
        }
        scope
    }

    /// Copy variables a root module declared at top level into the globals.
    fn capture_globals(&self, generation: u64, scope: &Scope, bound: usize) {
        let mut state = self.inner.state.borrow_mut();
        if state.number != generation {
            return;
        }
        for (name, _, value) in scope.iter().skip(bound) {
            if RESERVED_BINDINGS.contains(&name) {
                continue;
            }
            debug!(name, "captured global");
            state.globals.insert(name.into(), value);
        }
    }

    /// Cache exports unless a reset started a new generation meanwhile.
    fn store(&self, generation: u64, id: &str, exports: Dynamic) {
        let mut state = self.inner.state.borrow_mut();
        if state.number == generation {
            state.cache.insert(id, exports);
        } else {
            debug!(id, "generation changed during load; not cached");
        }
    }
}

/// `module.exports` when the module replaced or filled it, else `exports`.
fn module_exports(scope: &Scope) -> Dynamic {
    let replaced = scope
        .get_value::<Map>("module")
        .and_then(|module| module.get("exports").cloned())
        .filter(|exports| {
            exports
                .read_lock::<Map>()
                .map_or(true, |map| !map.is_empty())
        });

    replaced
        .or_else(|| scope.get_value::<Dynamic>("exports"))
        .unwrap_or_else(|| Dynamic::from_map(Map::new()))
}
