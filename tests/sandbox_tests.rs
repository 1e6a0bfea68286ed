//! End-to-end tests of the sandbox lifecycle.
//!
//! These drive the public API the way a host does: populate a file tree,
//! load bundles, fire events, reload, and check what the user was shown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use live_sandbox::error::UNKNOWN_MESSAGE;
use live_sandbox::prelude::*;
use live_sandbox::{EngineLimits, EventPlatform, MemoryFileSystem, NativeRegistry};

const ROOT: &str = "/app/Resources";

struct Fixture {
    sandbox: Sandbox,
    fs: Rc<MemoryFileSystem>,
    bus: Rc<EventBus>,
    notifier: Rc<RecordingNotifier>,
}

fn fixture() -> Fixture {
    fixture_with(SandboxConfig::builder().resources_dir(ROOT).build(), NativeRegistry::new())
}

fn fixture_with(config: SandboxConfig, native: NativeRegistry) -> Fixture {
    let fs = Rc::new(MemoryFileSystem::new());
    let bus = Rc::new(EventBus::new());
    let notifier = Rc::new(RecordingNotifier::new());
    let sandbox = Sandbox::builder(config)
        .file_system(fs.clone())
        .platform(bus.clone())
        .notifier(notifier.clone())
        .native_modules(Rc::new(native))
        .build()
        .unwrap();
    Fixture {
        sandbox,
        fs,
        bus,
        notifier,
    }
}

fn script(fs: &MemoryFileSystem, name: &str, source: &str) -> String {
    let path = format!("{ROOT}/{name}.rhai");
    fs.insert(path.clone(), source);
    path
}

fn field(exports: &Dynamic, key: &str) -> Dynamic {
    exports
        .read_lock::<Map>()
        .and_then(|map| map.get(key).cloned())
        .unwrap_or_else(|| panic!("missing export {key}"))
}

/// Test that a second require is served from the cache.
#[test]
fn test_require_evaluates_once_per_generation() {
    let f = fixture();
    let path = script(&f.fs, "bar", "exports.value = 41 + 1;");

    let first = f.sandbox.require("bar", RequireOptions::default()).unwrap();
    let second = f.sandbox.require("bar", RequireOptions::default()).unwrap();

    assert_eq!(f.fs.read_count(&path), 1);
    assert_eq!(field(&first, "value").as_int().unwrap(), 42);
    assert_eq!(field(&second, "value").as_int().unwrap(), 42);
    assert!(f.sandbox.is_cached("bar"));
}

/// Test that a reset empties the cache.
#[test]
fn test_clean_forces_reevaluation() {
    let f = fixture();
    let path = script(&f.fs, "bar", "exports.value = 1;");

    f.sandbox.require("bar", RequireOptions::default()).unwrap();
    f.sandbox.clean().unwrap();
    assert!(!f.sandbox.is_cached("bar"));

    f.sandbox.require("bar", RequireOptions::default()).unwrap();
    assert_eq!(f.fs.read_count(&path), 2);
}

/// Test that a cached module does not subscribe again.
#[test]
fn test_cached_module_registers_listener_once() {
    let f = fixture();
    script(
        &f.fs,
        "bar",
        r#"
            let events = __proxy.events;
            events.add_event_listener("App", "resume", |e| e);
            exports.ready = true;
        "#,
    );

    f.sandbox.require("bar", RequireOptions::default()).unwrap();
    f.sandbox.require("bar", RequireOptions::default()).unwrap();

    assert_eq!(f.bus.add_calls(), 1);
    assert_eq!(f.bus.listener_count("App", "resume"), 1);
    assert_eq!(f.sandbox.listener_count(), 1);
}

/// Test that a root reload resets state before a broken module fails.
#[test]
fn test_root_reload_with_syntax_error() {
    let f = fixture();
    script(&f.fs, "lib", "exports.x = 1;");
    script(&f.fs, "foo", "let x = ;");

    f.sandbox.require("lib", RequireOptions::default()).unwrap();
    f.sandbox.set_global("stale", Dynamic::from(true));
    let generation = f.sandbox.generation();

    let result = f.sandbox.require("foo", RequireOptions::root());

    assert!(result.is_none());
    assert_eq!(f.sandbox.generation(), generation + 1);
    assert!(f.sandbox.cached_ids().is_empty());
    assert!(f.sandbox.global("stale").is_none());

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    let title = notices[0].title.as_deref().unwrap();
    assert!(title.starts_with("foo.rhai"), "unexpected title {title}");
    assert!(!notices[0].message.is_empty());
    assert_ne!(notices[0].message, UNKNOWN_MESSAGE);
}

/// Test that native fallback results are cached.
#[test]
fn test_native_fallback_is_cached() {
    let loads = Rc::new(Cell::new(0));
    let counter = Rc::clone(&loads);
    let mut native = NativeRegistry::new();
    native.register("platformModule", move || {
        counter.set(counter.get() + 1);
        Ok(Dynamic::from("native exports"))
    });
    let f = fixture_with(SandboxConfig::builder().resources_dir(ROOT).build(), native);

    let first = f.sandbox.require("platformModule", RequireOptions::default()).unwrap();
    let second = f.sandbox.require("platformModule", RequireOptions::default()).unwrap();

    assert_eq!(loads.get(), 1);
    assert_eq!(first.into_string().unwrap(), "native exports");
    assert_eq!(second.into_string().unwrap(), "native exports");
    assert!(f.sandbox.is_cached("platformModule"));
}

/// Test that an unknown native module is reported by identifier.
#[test]
fn test_unknown_native_module_is_reported_under_its_identifier() {
    let f = fixture();

    assert!(f.sandbox.require("ti.nothing", RequireOptions::default()).is_none());

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title.as_deref(), Some("ti.nothing"));
    assert!(notices[0].message.contains("ti.nothing"));
    assert!(!f.sandbox.is_cached("ti.nothing"));
}

/// Test that errors without a file get the module's path.
#[test]
fn test_runtime_error_is_stamped_with_resolved_file() {
    let f = fixture();
    script(&f.fs, "boom", r#"throw "kaboom";"#);

    assert!(f.sandbox.require("boom", RequireOptions::default()).is_none());

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].title.as_deref().unwrap().starts_with("boom.rhai:1"));
    assert_eq!(notices[0].message, "kaboom");
}

/// Test that a thrown map keeps its own location.
#[test]
fn test_thrown_attribution_is_kept() {
    let f = fixture();
    script(
        &f.fs,
        "boom",
        r#"throw #{ message: "custom", filename: "/app/Resources/other.rhai", line: 7 };"#,
    );

    f.sandbox.require("boom", RequireOptions::default());

    let notices = f.notifier.notices();
    assert_eq!(notices[0].title.as_deref(), Some("other.rhai:7"));
    assert_eq!(notices[0].message, "custom");
}

/// Test that failed loads are not cached.
#[test]
fn test_failed_loads_are_retried() {
    let f = fixture();
    let path = script(&f.fs, "flaky", r#"throw "not yet";"#);

    assert!(f.sandbox.require("flaky", RequireOptions::default()).is_none());
    script(&f.fs, "flaky", "exports.ok = true;");
    let exports = f.sandbox.require("flaky", RequireOptions::default()).unwrap();

    assert!(field(&exports, "ok").as_bool().unwrap());
    assert_eq!(f.fs.read_count(&path), 2);
}

/// Test nested requires and the injected path bindings.
#[test]
fn test_nested_require_shares_cache_and_bindings() {
    let f = fixture();
    script(
        &f.fs,
        "lib/util",
        r#"
            exports.base = 10;
            exports.dir = __dirname;
            exports.file = __filename;
        "#,
    );
    script(
        &f.fs,
        "main",
        r#"
            let util = require("lib/util");
            exports.total = util.base + 5;
            exports.util_dir = util.dir;
            exports.util_file = util.file;
        "#,
    );

    let exports = f.sandbox.require("main", RequireOptions::root()).unwrap();

    assert_eq!(field(&exports, "total").as_int().unwrap(), 15);
    assert_eq!(
        field(&exports, "util_dir").into_string().unwrap(),
        "/app/Resources/lib"
    );
    assert_eq!(
        field(&exports, "util_file").into_string().unwrap(),
        "/app/Resources/lib/util.rhai"
    );
    assert_eq!(f.sandbox.cached_ids(), vec!["lib/util", "main"]);
}

/// Test replacing module.exports.
#[test]
fn test_module_exports_replacement() {
    let f = fixture();
    script(&f.fs, "answer", "module.exports = 42;");

    let exports = f.sandbox.require("answer", RequireOptions::default()).unwrap();
    assert_eq!(exports.as_int().unwrap(), 42);
}

/// Test capture of a root module's top-level variables.
#[test]
fn test_root_globals_are_captured() {
    let f = fixture();
    script(&f.fs, "app", r#"let theme = "dark"; exports.ok = true;"#);
    script(&f.fs, "view", "exports.theme = theme;");
    script(&f.fs, "helper", "let secret = 1;");

    f.sandbox.require("app", RequireOptions::root()).unwrap();
    assert_eq!(f.sandbox.global("theme").unwrap().into_string().unwrap(), "dark");

    let view = f.sandbox.require("view", RequireOptions::default()).unwrap();
    assert_eq!(field(&view, "theme").into_string().unwrap(), "dark");

    f.sandbox.require("helper", RequireOptions::default()).unwrap();
    assert!(f.sandbox.global("secret").is_none());
}

/// Test turning root global capture off.
#[test]
fn test_root_global_capture_can_be_disabled() {
    let config = SandboxConfig::builder()
        .resources_dir(ROOT)
        .capture_root_globals(false)
        .build();
    let f = fixture_with(config, NativeRegistry::new());
    script(&f.fs, "app", r#"let theme = "dark";"#);

    f.sandbox.require("app", RequireOptions::root()).unwrap();
    assert!(f.sandbox.global("theme").is_none());
}

/// Test that globals are read when a module is instantiated.
#[test]
fn test_globals_are_captured_at_instantiation() {
    let f = fixture();
    script(&f.fs, "a", "exports.count = count;");
    script(&f.fs, "b", "exports.count = count;");

    f.sandbox.set_global("count", Dynamic::from(1_i64));
    f.sandbox.require("a", RequireOptions::default()).unwrap();
    f.sandbox.set_global("count", Dynamic::from(2_i64));

    let a = f.sandbox.require("a", RequireOptions::default()).unwrap();
    let b = f.sandbox.require("b", RequireOptions::default()).unwrap();
    assert_eq!(field(&a, "count").as_int().unwrap(), 1);
    assert_eq!(field(&b, "count").as_int().unwrap(), 2);
}

/// Test publishing a global from a script.
#[test]
fn test_script_set_global() {
    let f = fixture();
    script(&f.fs, "a", r#"__proxy.set_global("shared", 5);"#);
    script(&f.fs, "b", "exports.shared = shared + 1;");

    f.sandbox.require("a", RequireOptions::default()).unwrap();
    let b = f.sandbox.require("b", RequireOptions::default()).unwrap();
    assert_eq!(field(&b, "shared").as_int().unwrap(), 6);
}

/// Test that host bindings outlive resets.
#[test]
fn test_host_bindings_survive_resets() {
    let fs = Rc::new(MemoryFileSystem::new());
    let sandbox = Sandbox::builder(SandboxConfig::builder().resources_dir(ROOT).build())
        .file_system(fs.clone())
        .binding("host_version", Dynamic::from("1.2.3"))
        .build()
        .unwrap();
    script(&fs, "app", "exports.version = host_version;");

    for _ in 0..2 {
        let exports = sandbox.require("app", RequireOptions::root()).unwrap();
        assert_eq!(field(&exports, "version").into_string().unwrap(), "1.2.3");
    }
}

/// Test the transform's capability flags and the kept source.
#[test]
fn test_transform_sees_capabilities_and_its_output_is_kept() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let fs = Rc::new(MemoryFileSystem::new());
    let sandbox = Sandbox::builder(SandboxConfig::builder().resources_dir(ROOT).build())
        .file_system(fs.clone())
        .transform(move |source: &str, caps: Capabilities| -> anyhow::Result<String> {
            log.borrow_mut().push(caps);
            Ok(source.replace("OLD", "\"new\""))
        })
        .build()
        .unwrap();
    let app = script(&fs, "app", r#"let dep = require("dep"); exports.v = OLD;"#);
    script(&fs, "dep", "exports.d = 1;");

    let exports = sandbox.require("app", RequireOptions::root()).unwrap();

    assert_eq!(field(&exports, "v").into_string().unwrap(), "new");
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].globals && seen[0].events && seen[0].exception);
    assert!(!seen[1].globals && seen[1].resource && seen[1].exit);
    assert_eq!(
        sandbox.source(&app).unwrap(),
        r#"let dep = require("dep"); exports.v = "new";"#
    );
}

/// Test that a failing transform is reported.
#[test]
fn test_transform_failure_is_contained() {
    let fs = Rc::new(MemoryFileSystem::new());
    let notifier = Rc::new(RecordingNotifier::new());
    let sandbox = Sandbox::builder(SandboxConfig::builder().resources_dir(ROOT).build())
        .file_system(fs.clone())
        .notifier(notifier.clone())
        .transform(|_: &str, _: Capabilities| -> anyhow::Result<String> {
            anyhow::bail!("unsupported syntax")
        })
        .build()
        .unwrap();
    script(&fs, "app", "exports.x = 1;");

    assert!(sandbox.require("app", RequireOptions::default()).is_none());

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title.as_deref(), Some("app.rhai"));
    assert!(notices[0].message.contains("unsupported syntax"));
}

/// Test that a require cycle is reported instead of recursing.
#[test]
fn test_circular_require_is_contained() {
    let f = fixture();
    script(&f.fs, "a", r#"let b = require("b"); exports.a = 1;"#);
    script(&f.fs, "b", r#"let a = require("a"); exports.saw_a = type_of(a);"#);

    let a = f.sandbox.require("a", RequireOptions::default()).unwrap();
    assert_eq!(field(&a, "a").as_int().unwrap(), 1);

    let b = f.sandbox.require("b", RequireOptions::default()).unwrap();
    assert_eq!(field(&b, "saw_a").into_string().unwrap(), "()");

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title.as_deref(), Some("a.rhai"));
    assert!(notices[0].message.contains("circular"));
}

/// Test a root reload started from inside a module.
#[test]
fn test_nested_root_reload_does_not_leak_into_new_generation() {
    let f = fixture();
    script(&f.fs, "a", r#"require("b", #{ root: true }); exports.a = 1;"#);
    script(&f.fs, "b", "exports.b = 1;");

    let a = f.sandbox.require("a", RequireOptions::default()).unwrap();

    assert_eq!(field(&a, "a").as_int().unwrap(), 1);
    assert_eq!(f.sandbox.generation(), 1);
    assert!(f.sandbox.is_cached("b"));
    assert!(!f.sandbox.is_cached("a"));
}

/// Test dispatch, then listener removal on reload.
#[test]
fn test_listeners_are_dispatched_and_drained_on_reload() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            let events = __proxy.events;
            events.add_event_listener("App", "resume", |e| e * 2);
            events.add_event_listener("Gesture", "shake", |e| e);
        "#,
    );
    script(&f.fs, "next", "exports.ok = true;");

    f.sandbox.require("app", RequireOptions::root()).unwrap();
    assert_eq!(f.bus.total_listeners(), 2);

    let listeners = f.bus.listeners("App", "resume");
    let doubled = f.sandbox.invoke(&listeners[0], Dynamic::from(5_i64)).unwrap();
    assert_eq!(doubled.as_int().unwrap(), 10);
    assert_eq!(f.sandbox.dispatch(&f.bus, "Gesture", "shake", Dynamic::UNIT), 1);

    f.sandbox.require("next", RequireOptions::root()).unwrap();

    assert_eq!(f.bus.total_listeners(), 0);
    assert_eq!(f.bus.remove_calls(), 2);
    assert_eq!(f.sandbox.listener_count(), 0);
    assert_eq!(f.sandbox.dispatch(&f.bus, "App", "resume", Dynamic::UNIT), 0);
}

/// Test unsubscribing from a script.
#[test]
fn test_script_removes_listener() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            let events = __proxy.events;
            let handler = |e| e;
            events.add_event_listener("App", "pause", handler);
            events.add_event_listener("App", "pause", |e| e + 1);
            events.remove_event_listener("App", "pause", handler);
            events.remove_event_listener("App", "other", handler);
        "#,
    );

    f.sandbox.require("app", RequireOptions::default()).unwrap();

    assert_eq!(f.bus.remove_calls(), 2);
    assert_eq!(f.bus.listener_count("App", "pause"), 1);
    assert_eq!(f.sandbox.listener_count(), 1);

    let remaining = f.bus.listeners("App", "pause");
    let value = f.sandbox.invoke(&remaining[0], Dynamic::from(1_i64)).unwrap();
    assert_eq!(value.as_int().unwrap(), 2);
}

/// Test that one removal undoes one of two identical subscriptions.
#[test]
fn test_double_registration_is_undone_one_at_a_time() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            let events = __proxy.events;
            let handler = |e| e;
            events.add_event_listener("App", "resume", handler);
            events.add_event_listener("App", "resume", handler);
            events.remove_event_listener("App", "resume", handler);
        "#,
    );

    f.sandbox.require("app", RequireOptions::default()).unwrap();

    assert_eq!(f.bus.listener_count("App", "resume"), 1);
    assert_eq!(f.sandbox.listener_count(), 1);

    assert_eq!(f.sandbox.clean().unwrap(), 1);
    assert_eq!(f.bus.total_listeners(), 0);
    assert_eq!(f.sandbox.listener_count(), 0);
}

/// Test that closures from one expression are told apart by their captures.
#[test]
fn test_closures_differing_in_captures_are_distinct_listeners() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            let events = __proxy.events;
            let handlers = [];
            for i in 0..3 {
                let h = |e| e + i;
                handlers.push(h);
                events.add_event_listener("App", "tick", h);
            }
            events.remove_event_listener("App", "tick", handlers[0]);
        "#,
    );

    f.sandbox.require("app", RequireOptions::default()).unwrap();

    assert_eq!(f.bus.listener_count("App", "tick"), 2);
    assert_eq!(f.sandbox.listener_count(), 2);
    let results: Vec<i64> = f
        .bus
        .listeners("App", "tick")
        .iter()
        .map(|l| f.sandbox.invoke(l, Dynamic::from(10_i64)).unwrap().as_int().unwrap())
        .collect();
    assert_eq!(results, vec![11, 12]);

    assert_eq!(f.sandbox.clean().unwrap(), 2);
    assert_eq!(f.bus.total_listeners(), 0);
}

/// Test subscribing a handler defined in a required module.
#[test]
fn test_handler_exported_by_another_module() {
    let f = fixture();
    script(&f.fs, "lib", "exports.handler = |e| e * 3;");
    script(
        &f.fs,
        "main",
        r#"
            let lib = require("lib");
            let events = __proxy.events;
            events.add_event_listener("App", "resume", lib.handler);
        "#,
    );

    f.sandbox.require("main", RequireOptions::root()).unwrap();

    let listeners = f.bus.listeners("App", "resume");
    assert_eq!(listeners.len(), 1);
    let Listener::Script { filename, .. } = &listeners[0] else {
        panic!("Expected a script listener, got {:?}", listeners[0]);
    };
    assert_eq!(&**filename, "/app/Resources/lib.rhai");

    let value = f.sandbox.invoke(&listeners[0], Dynamic::from(2_i64)).unwrap();
    assert_eq!(value.as_int().unwrap(), 6);
    assert!(f.notifier.is_empty());

    f.sandbox.require("main", RequireOptions::root()).unwrap();
    assert_eq!(f.bus.total_listeners(), 1);
    assert_eq!(f.bus.remove_calls(), 1);
}

/// Test that a failing listener is reported against its module.
#[test]
fn test_failing_listener_is_reported_against_its_module() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            let events = __proxy.events;
            events.add_event_listener("App", "resume", |e| { throw "listener failed"; });
        "#,
    );
    f.sandbox.require("app", RequireOptions::default()).unwrap();

    let listeners = f.bus.listeners("App", "resume");
    assert!(f.sandbox.invoke(&listeners[0], Dynamic::UNIT).is_none());

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].title.as_deref().unwrap().starts_with("app.rhai"));
    assert!(notices[0].message.contains("listener failed"));
}

/// Test reporting an exception from a script.
#[test]
fn test_script_reports_handled_exception() {
    let f = fixture();
    script(
        &f.fs,
        "app",
        r#"
            __proxy.exception(#{ message: "handled" });
            exports.after = true;
        "#,
    );

    let exports = f.sandbox.require("app", RequireOptions::default()).unwrap();
    assert!(field(&exports, "after").as_bool().unwrap());

    let notices = f.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title.as_deref(), Some("app.rhai"));
    assert_eq!(notices[0].message, "handled");
}

/// Test resource resolution from a script.
#[test]
fn test_resource_from_script() {
    let config = SandboxConfig::builder()
        .resources_dir(ROOT)
        .platform_dir("iphone")
        .density(2)
        .build();
    let f = fixture_with(config, NativeRegistry::new());
    f.fs.insert("/app/Resources/iphone/images/logo@2x.png", "");
    f.fs.insert("/app/Resources/data/info.json", "{}");
    script(
        &f.fs,
        "app",
        r#"
            exports.logo = resource("images/logo.png");
            exports.info = __proxy.resource("data", "info.json");
            exports.root = resource();
            exports.remote = resource("https://example.com/z.png");
            exports.many = resource(["images/logo.png", 3]);
        "#,
    );

    let exports = f.sandbox.require("app", RequireOptions::default()).unwrap();

    assert_eq!(
        field(&exports, "logo").into_string().unwrap(),
        "/app/Resources/iphone/images/logo@2x.png"
    );
    assert_eq!(
        field(&exports, "info").into_string().unwrap(),
        "/app/Resources/data/info.json"
    );
    assert_eq!(field(&exports, "root").into_string().unwrap(), "/app/Resources/");
    assert_eq!(
        field(&exports, "remote").into_string().unwrap(),
        "https://example.com/z.png"
    );
    let many = field(&exports, "many").into_array().unwrap();
    assert_eq!(
        many[0].clone().into_string().unwrap(),
        "/app/Resources/iphone/images/logo@2x.png"
    );
    assert_eq!(many[1].as_int().unwrap(), 3);
}

/// Test that the operation budget stops an endless loop.
#[test]
fn test_runaway_module_is_stopped() {
    let config = SandboxConfig::builder()
        .resources_dir(ROOT)
        .limits(EngineLimits::default().with_max_operations(10_000))
        .build();
    let f = fixture_with(config, NativeRegistry::new());
    script(&f.fs, "spin", "loop { }");

    assert!(f.sandbox.require("spin", RequireOptions::default()).is_none());
    assert_eq!(f.notifier.len(), 1);
}

struct Sticky;

impl EventPlatform for Sticky {
    fn add_event_listener(&self, _: &str, _: &str, _: &Listener) -> anyhow::Result<()> {
        Ok(())
    }

    fn remove_event_listener(&self, _: &str, _: &str, _: &Listener) -> anyhow::Result<()> {
        anyhow::bail!("listener is stuck")
    }
}

/// Test that a refused removal is shown and the reset still happens.
#[test]
fn test_failed_drain_is_surfaced_and_reset_still_happens() {
    let fs = Rc::new(MemoryFileSystem::new());
    let notifier = Rc::new(RecordingNotifier::new());
    let sandbox = Sandbox::builder(SandboxConfig::builder().resources_dir(ROOT).build())
        .file_system(fs.clone())
        .platform(Rc::new(Sticky))
        .notifier(notifier.clone())
        .build()
        .unwrap();
    script(
        &fs,
        "app",
        r#"let events = __proxy.events; events.add_event_listener("App", "resume", |e| e);"#,
    );

    sandbox.require("app", RequireOptions::root()).unwrap();
    sandbox.require("app", RequireOptions::root()).unwrap();

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title.as_deref(), Some("Sandbox reset failed"));
    assert_eq!(sandbox.generation(), 2);
    assert_eq!(sandbox.listener_count(), 1);
}

/// Test loading modules from a real directory.
#[test]
fn test_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Resources");
    std::fs::create_dir_all(root.join("lib")).unwrap();
    std::fs::write(root.join("app.rhai"), r#"exports.lib = require("lib/helper").name;"#).unwrap();
    std::fs::write(root.join("lib").join("helper.rhai"), r#"exports.name = "helper";"#).unwrap();

    let root = root.to_string_lossy().to_string();
    let sandbox = Sandbox::builder(
        SandboxConfig::builder()
            .resources_dir(root.as_str())
            .separator(std::path::MAIN_SEPARATOR)
            .build(),
    )
    .build()
    .unwrap();

    let exports = sandbox.require("app", RequireOptions::root()).unwrap();
    assert_eq!(field(&exports, "lib").into_string().unwrap(), "helper");
    assert_eq!(
        sandbox.resource_root(),
        format!("{root}{}", std::path::MAIN_SEPARATOR)
    );
}
