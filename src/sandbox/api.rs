//! Script-facing API registered on each sandbox's engine.
//!
//! Modules see free functions `require` and `resource`, plus the `__proxy`
//! binding (type `Sandbox`) with `require`, `resource`, `exception`, `clean`,
//! `set_global`, and the `globals` and `events` properties.

use std::fmt;
use std::rc::Weak;

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map};
use tracing::{debug, info};

use crate::error::{Exception, SandboxError};
use crate::sandbox::events::Listener;
use crate::sandbox::loader::RequireOptions;
use crate::sandbox::runtime::{Inner, Sandbox};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Script-side reference to the sandbox (`__proxy`).
#[derive(Clone)]
pub struct SandboxHandle {
    inner: Weak<Inner>,
}

impl SandboxHandle {
    pub(crate) fn from_weak(inner: Weak<Inner>) -> Self {
        Self { inner }
    }

    fn sandbox(&self) -> ScriptResult<Sandbox> {
        self.inner
            .upgrade()
            .map(Sandbox::from_inner)
            .ok_or_else(|| SandboxError::Detached.to_string().into())
    }
}

impl fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Script-side view of the sandbox's event API (`__proxy.events`).
#[derive(Debug, Clone)]
pub struct EventsHandle(SandboxHandle);

fn require_options(options: &Map) -> RequireOptions {
    RequireOptions {
        root: options
            .get("root")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false),
    }
}

fn require(handle: &SandboxHandle, id: &str, options: RequireOptions) -> ScriptResult<Dynamic> {
    Ok(handle
        .sandbox()?
        .require(id, options)
        .unwrap_or(Dynamic::UNIT))
}

fn resource(handle: &SandboxHandle, segments: &[&str]) -> ScriptResult<String> {
    Ok(handle.sandbox()?.resource(segments))
}

/// Element-wise resolution; non-string elements pass through untouched.
fn resource_array(handle: &SandboxHandle, paths: Array) -> ScriptResult<Array> {
    let sandbox = handle.sandbox()?;
    Ok(paths
        .into_iter()
        .map(|path| {
            if path.is_string() {
                let path = path.into_string().unwrap_or_default();
                Dynamic::from(sandbox.resource(&[path]))
            } else {
                path
            }
        })
        .collect())
}

fn exception(handle: &SandboxHandle, error: Dynamic) -> ScriptResult<()> {
    let sandbox = handle.sandbox()?;
    let mut exception = Exception::from_value(&error);
    if let Some(active) = sandbox.active() {
        exception = exception.or_filename(&active.filename);
    }
    sandbox.exception(&exception);
    Ok(())
}

/// Wrap `callback` as a listener of the module that defines it.
///
/// Handlers may come from any module loaded this generation, not only the one
/// registering them.
fn script_listener(sandbox: &Sandbox, callback: FnPtr) -> ScriptResult<Listener> {
    let module = sandbox
        .defining_module(callback.fn_name())
        .or_else(|| sandbox.active())
        .ok_or_else(|| -> Box<EvalAltResult> { "no module is running".into() })?;
    Ok(Listener::Script {
        callback,
        ast: module.ast,
        filename: module.filename,
    })
}

fn add_event_listener(
    events: &EventsHandle,
    channel: &str,
    name: &str,
    callback: FnPtr,
) -> ScriptResult<()> {
    let sandbox = events.0.sandbox()?;
    let listener = script_listener(&sandbox, callback)?;
    sandbox
        .add_event_listener(channel, name, listener)
        .map_err(|e| e.to_string().into())
}

fn remove_event_listener(
    events: &EventsHandle,
    channel: &str,
    name: &str,
    callback: FnPtr,
) -> ScriptResult<()> {
    let sandbox = events.0.sandbox()?;
    let listener = script_listener(&sandbox, callback)?;
    sandbox
        .remove_event_listener(channel, name, &listener)
        .map_err(|e| e.to_string().into())
}

pub(crate) fn register(engine: &mut Engine, handle: SandboxHandle) {
    engine.on_print(|text| info!(target: "live_sandbox::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        debug!(
            target: "live_sandbox::script",
            source = source.unwrap_or(""),
            line = pos.line().unwrap_or(0),
            "{text}"
        )
    });

    engine
        .register_type_with_name::<SandboxHandle>("Sandbox")
        .register_type_with_name::<EventsHandle>("SandboxEvents");

    // Free functions, bound to this sandbox.
    let h = handle.clone();
    engine.register_fn("require", move |id: &str| {
        require(&h, id, RequireOptions::default())
    });
    let h = handle.clone();
    engine.register_fn("require", move |id: &str, options: Map| {
        require(&h, id, require_options(&options))
    });
    let h = handle.clone();
    engine.register_fn("resource", move || resource(&h, &[]));
    let h = handle.clone();
    engine.register_fn("resource", move |a: &str| resource(&h, &[a]));
    let h = handle.clone();
    engine.register_fn("resource", move |a: &str, b: &str| resource(&h, &[a, b]));
    let h = handle.clone();
    engine.register_fn("resource", move |a: &str, b: &str, c: &str| {
        resource(&h, &[a, b, c])
    });
    let h = handle;
    engine.register_fn("resource", move |paths: Array| resource_array(&h, paths));

    // Methods of `__proxy`.
    engine
        .register_fn("require", |h: &mut SandboxHandle, id: &str| {
            require(h, id, RequireOptions::default())
        })
        .register_fn("require", |h: &mut SandboxHandle, id: &str, options: Map| {
            require(h, id, require_options(&options))
        })
        .register_fn("resource", |h: &mut SandboxHandle| resource(h, &[]))
        .register_fn("resource", |h: &mut SandboxHandle, a: &str| resource(h, &[a]))
        .register_fn("resource", |h: &mut SandboxHandle, a: &str, b: &str| {
            resource(h, &[a, b])
        })
        .register_fn("resource", |h: &mut SandboxHandle, paths: Array| {
            resource_array(h, paths)
        })
        .register_fn("exception", |h: &mut SandboxHandle, error: Dynamic| {
            exception(h, error)
        })
        .register_fn("clean", |h: &mut SandboxHandle| -> ScriptResult<i64> {
            let removed = h.sandbox()?.clean().map_err(|e| e.to_string())?;
            Ok(i64::try_from(removed).unwrap_or(i64::MAX))
        })
        .register_fn(
            "set_global",
            |h: &mut SandboxHandle, name: &str, value: Dynamic| -> ScriptResult<()> {
                h.sandbox()?.set_global(name, value);
                Ok(())
            },
        )
        .register_get("globals", |h: &mut SandboxHandle| {
            h.sandbox().map(|s| s.globals()).unwrap_or_default()
        })
        .register_get("events", |h: &mut SandboxHandle| EventsHandle(h.clone()));

    // Methods of `__proxy.events`.
    engine
        .register_fn(
            "add_event_listener",
            |events: &mut EventsHandle, channel: &str, name: &str, callback: FnPtr| {
                add_event_listener(events, channel, name, callback)
            },
        )
        .register_fn(
            "remove_event_listener",
            |events: &mut EventsHandle, channel: &str, name: &str, callback: FnPtr| {
                remove_event_listener(events, channel, name, callback)
            },
        );
}
