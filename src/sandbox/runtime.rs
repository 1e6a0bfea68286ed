//! The sandbox runtime object.
//!
//! [`Sandbox`] composes the resolver, the module loader, the event registry
//! and the exception reporter behind one handle. It lives as long as the
//! host session; every root reload swaps its generation-scoped state for a
//! fresh one.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, Engine, Map, AST};
use tracing::{debug, error, info};

use crate::error::{Exception, Result, SandboxError};
use crate::sandbox::api::{self, SandboxHandle};
use crate::sandbox::cache::Generation;
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::events::{EventBus, EventPlatform, EventRegistry, Listener};
use crate::sandbox::io::{FileSystem, OsFileSystem};
use crate::sandbox::native::{NativeModules, NativeRegistry};
use crate::sandbox::report::{notice_for, LogNotifier, Notice, Notifier};
use crate::sandbox::resolver::ResourceResolver;
use crate::sandbox::transform::{Passthrough, SourceTransform};

/// Collaborators supplied by the host.
pub(crate) struct Host {
    pub(crate) fs: Rc<dyn FileSystem>,
    pub(crate) transform: Box<dyn SourceTransform>,
    pub(crate) native: Rc<dyn NativeModules>,
    pub(crate) platform: Rc<dyn EventPlatform>,
    pub(crate) notifier: Rc<dyn Notifier>,
}

/// A compiled module: running right now, or loaded this generation.
#[derive(Debug, Clone)]
pub(crate) struct ActiveModule {
    pub(crate) ast: Rc<AST>,
    pub(crate) filename: Rc<str>,
}

pub(crate) struct Inner {
    pub(crate) config: SandboxConfig,
    pub(crate) resolver: ResourceResolver,
    pub(crate) engine: Engine,
    pub(crate) host: Host,
    /// Host bindings injected into every module of every generation.
    pub(crate) bindings: Map,
    pub(crate) state: RefCell<Generation>,
    pub(crate) events: RefCell<EventRegistry>,
    pub(crate) active: RefCell<Vec<ActiveModule>>,
    /// Resolved paths of modules whose evaluation has not finished.
    pub(crate) loading: RefCell<Vec<String>>,
}

/// Pops a stack entry when dropped, so early returns keep stacks balanced.
pub(crate) struct StackGuard<'a, T> {
    stack: &'a RefCell<Vec<T>>,
}

impl<'a, T> StackGuard<'a, T> {
    pub(crate) fn push(stack: &'a RefCell<Vec<T>>, item: T) -> Self {
        stack.borrow_mut().push(item);
        Self { stack }
    }
}

impl<T> Drop for StackGuard<'_, T> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// A resettable module sandbox.
///
/// Cloning is cheap; clones share the same state.
///
/// # Example
///
/// ```rust,ignore
/// use live_sandbox::prelude::*;
///
/// let sandbox = Sandbox::builder(SandboxConfig::default()).build()?;
/// let app = sandbox.require("app", RequireOptions::root());
/// ```
#[derive(Clone)]
pub struct Sandbox {
    pub(crate) inner: Rc<Inner>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("resources_dir", &self.inner.config.resources_dir)
            .field("generation", &self.generation())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Builder for [`Sandbox`]; every collaborator has a default.
pub struct SandboxBuilder {
    config: SandboxConfig,
    fs: Option<Rc<dyn FileSystem>>,
    transform: Option<Box<dyn SourceTransform>>,
    native: Option<Rc<dyn NativeModules>>,
    platform: Option<Rc<dyn EventPlatform>>,
    notifier: Option<Rc<dyn Notifier>>,
    bindings: Map,
}

impl SandboxBuilder {
    /// Use `fs` for resolution and source reads (default: [`OsFileSystem`]).
    pub fn file_system(mut self, fs: Rc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Use `transform` on module sources (default: [`Passthrough`]).
    pub fn transform(mut self, transform: impl SourceTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Use `native` for identifiers without sandboxed source
    /// (default: an empty [`NativeRegistry`]).
    pub fn native_modules(mut self, native: Rc<dyn NativeModules>) -> Self {
        self.native = Some(native);
        self
    }

    /// Forward subscriptions to `platform` (default: a private [`EventBus`]).
    pub fn platform(mut self, platform: Rc<dyn EventPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Show failures through `notifier` (default: [`LogNotifier`]).
    pub fn notifier(mut self, notifier: Rc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Inject `value` as `name` into every module, across resets.
    pub fn binding(mut self, name: impl Into<String>, value: Dynamic) -> Self {
        self.bindings.insert(name.into().into(), value);
        self
    }

    /// Build the sandbox.
    pub fn build(self) -> Result<Sandbox> {
        self.config.validate()?;

        let host = Host {
            fs: self.fs.unwrap_or_else(|| Rc::new(OsFileSystem)),
            transform: self.transform.unwrap_or_else(|| Box::new(Passthrough)),
            native: self
                .native
                .unwrap_or_else(|| Rc::new(NativeRegistry::new())),
            platform: self.platform.unwrap_or_else(|| Rc::new(EventBus::new())),
            notifier: self.notifier.unwrap_or_else(|| Rc::new(LogNotifier)),
        };
        let config = self.config;
        let bindings = self.bindings;

        let inner = Rc::new_cyclic(|weak| {
            let mut engine = Engine::new();
            config.limits.apply(&mut engine);
            api::register(&mut engine, SandboxHandle::from_weak(weak.clone()));

            Inner {
                resolver: ResourceResolver::new(&config),
                config,
                engine,
                host,
                bindings,
                state: RefCell::new(Generation::default()),
                events: RefCell::new(EventRegistry::new()),
                active: RefCell::new(Vec::new()),
                loading: RefCell::new(Vec::new()),
            }
        });

        debug!(root = %inner.resolver.root_dir(), "sandbox created");
        Ok(Sandbox { inner })
    }
}

impl Sandbox {
    /// Start building a sandbox over `config`.
    pub fn builder(config: SandboxConfig) -> SandboxBuilder {
        SandboxBuilder {
            config,
            fs: None,
            transform: None,
            native: None,
            platform: None,
            notifier: None,
            bindings: Map::new(),
        }
    }

    /// The configuration the sandbox was built with.
    pub fn config(&self) -> &SandboxConfig {
        &self.inner.config
    }

    /// The resource root with exactly one trailing separator.
    pub fn resource_root(&self) -> String {
        self.inner.resolver.root_dir()
    }

    /// Resolve a resource path given as segments.
    ///
    /// No segments yields the resource root. Unresolvable and remote paths
    /// come back joined but otherwise untouched.
    pub fn resource<S: AsRef<str>>(&self, segments: &[S]) -> String {
        if segments.is_empty() {
            return self.resource_root();
        }
        let path = self.inner.resolver.join(segments);
        self.inner
            .resolver
            .resolve(self.inner.host.fs.as_ref(), &path)
            .unwrap_or(path)
    }

    /// Resolve each path on its own.
    pub fn resource_all<S: AsRef<str>>(&self, paths: &[S]) -> Vec<String> {
        paths.iter().map(|p| self.resource(&[p.as_ref()])).collect()
    }

    /// Tear down all generation state.
    ///
    /// Removes every listener registered through the sandbox from the
    /// platform, then replaces the module cache, globals and sources with
    /// empty ones. Returns the number of listeners removed. The reset happens
    /// even when the platform refuses some removals; that case is returned
    /// as [`SandboxError::Drain`].
    pub fn clean(&self) -> Result<usize> {
        let registry = std::mem::take(&mut *self.inner.events.borrow_mut());
        let drained = registry.drain_all(self.inner.host.platform.as_ref());

        let next = self.inner.state.borrow().next();
        let number = next.number;
        let previous = std::mem::replace(&mut *self.inner.state.borrow_mut(), next);
        drop(previous);

        match &drained {
            Ok(removed) => debug!("removed {removed} events"),
            Err(err) => error!(error = %err, "reset left listeners on the platform"),
        }
        info!(generation = number, "sandbox reset");
        drained
    }

    /// Present a contained failure to the user.
    pub fn exception(&self, exception: &Exception) {
        error!(?exception, "uncaught exception");

        if let Some(file) = &exception.filename {
            if let Some(source) = self.inner.state.borrow().sources.get(file) {
                error!(filename = %file, "{source}");
            }
        }

        let resolver = &self.inner.resolver;
        let notice = notice_for(exception, |file| resolver.relative_path(file));
        self.inner.host.notifier.notify(&notice);
    }

    /// Surface a failed reset, which no caller can recover from.
    pub(crate) fn report_fatal(&self, err: &SandboxError) {
        error!(error = %err, "sandbox state is inconsistent");
        self.inner.host.notifier.notify(&Notice {
            title: Some("Sandbox reset failed".to_string()),
            message: err.to_string(),
        });
    }

    /// Subscribe `listener` to `name` on `channel` through the sandbox.
    pub fn add_event_listener(&self, channel: &str, name: &str, listener: Listener) -> Result<()> {
        debug!("add event: {channel}:{name}");
        self.inner
            .host
            .platform
            .add_event_listener(channel, name, &listener)
            .map_err(SandboxError::Platform)?;
        self.inner.events.borrow_mut().record(channel, name, listener);
        Ok(())
    }

    /// Unsubscribe `listener`.
    ///
    /// The platform removal is issued whether or not the sandbox tracks the
    /// listener. At most one tracked entry is dropped, matching the one
    /// subscription the platform takes off; other listeners are untouched.
    pub fn remove_event_listener(
        &self,
        channel: &str,
        name: &str,
        listener: &Listener,
    ) -> Result<()> {
        debug!("remove event: {channel}:{name}");
        let forgotten = self.inner.events.borrow_mut().forget(channel, name, listener);
        if !forgotten {
            debug!(channel, name, "listener was not tracked");
        }
        self.inner
            .host
            .platform
            .remove_event_listener(channel, name, listener)
            .map_err(SandboxError::Platform)
    }

    /// Number of listeners the sandbox currently owns.
    pub fn listener_count(&self) -> usize {
        self.inner.events.borrow().len()
    }

    /// Run `listener` with `payload`, reporting failures instead of
    /// returning them.
    pub fn invoke(&self, listener: &Listener, payload: Dynamic) -> Option<Dynamic> {
        match listener {
            Listener::Native(callback) => {
                callback(&payload);
                Some(Dynamic::UNIT)
            }
            Listener::Script {
                callback,
                ast,
                filename,
            } => {
                let _active = StackGuard::push(
                    &self.inner.active,
                    ActiveModule {
                        ast: Rc::clone(ast),
                        filename: Rc::clone(filename),
                    },
                );
                match callback.call::<Dynamic>(&self.inner.engine, ast, (payload,)) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        self.exception(&Exception::from_eval(err).or_filename(filename));
                        None
                    }
                }
            }
        }
    }

    /// Invoke every listener `bus` holds for `(channel, name)`.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, bus: &EventBus, channel: &str, name: &str, payload: Dynamic) -> usize {
        let listeners = bus.listeners(channel, name);
        for listener in &listeners {
            self.invoke(listener, payload.clone());
        }
        listeners.len()
    }

    /// Current generation number; every reset increments it.
    pub fn generation(&self) -> u64 {
        self.inner.state.borrow().number
    }

    /// Whether `id` has cached exports in this generation.
    pub fn is_cached(&self, id: &str) -> bool {
        self.inner.state.borrow().cache.contains(id)
    }

    /// Identifiers cached in this generation, sorted.
    pub fn cached_ids(&self) -> Vec<String> {
        self.inner.state.borrow().cache.ids()
    }

    /// A value of the globals map.
    pub fn global(&self, name: &str) -> Option<Dynamic> {
        self.inner.state.borrow().globals.get(name).cloned()
    }

    /// Copy of the globals map.
    pub fn globals(&self) -> Map {
        self.inner.state.borrow().globals.clone()
    }

    /// Set a value of the globals map.
    ///
    /// Only modules loaded afterwards see it, and only until the next reset.
    pub fn set_global(&self, name: impl Into<String>, value: Dynamic) {
        self.inner
            .state
            .borrow_mut()
            .globals
            .insert(name.into().into(), value);
    }

    /// Transformed source last loaded from `path`.
    pub fn source(&self, path: &str) -> Option<String> {
        self.inner.state.borrow().sources.get(path).cloned()
    }

    pub(crate) fn from_inner(inner: Rc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn handle(&self) -> SandboxHandle {
        SandboxHandle::from_weak(Rc::downgrade(&self.inner))
    }

    /// The module or listener currently running, if any.
    pub(crate) fn active(&self) -> Option<ActiveModule> {
        self.inner.active.borrow().last().cloned()
    }

    /// The compiled module that defines script function `fn_name`.
    ///
    /// Running modules are searched innermost first, then every module loaded
    /// this generation, newest first.
    pub(crate) fn defining_module(&self, fn_name: &str) -> Option<ActiveModule> {
        let running = self
            .inner
            .active
            .borrow()
            .iter()
            .rev()
            .find(|module| defines(module, fn_name))
            .cloned();
        running.or_else(|| {
            self.inner
                .state
                .borrow()
                .scripts
                .iter()
                .rev()
                .find(|module| defines(module, fn_name))
                .cloned()
        })
    }
}

fn defines(module: &ActiveModule, fn_name: &str) -> bool {
    module.ast.iter_functions().any(|f| f.name == fn_name)
}
