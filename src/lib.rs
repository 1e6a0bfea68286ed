//! # Live Sandbox
//!
//! A resettable module sandbox for hosts that load and re-load application
//! scripts they do not control, without restarting the host process.
//!
//! Scripts are [Rhai](https://rhai.rs) modules stored under a resource root.
//! The sandbox provides:
//!
//! - **Resource virtualization**: logical paths resolve against the resource
//!   root, preferring platform-override directories and density-suffixed
//!   image variants
//! - **Module loading**: `require` with a per-generation cache, host source
//!   transformation and an explicit scope of injected bindings
//! - **Listener accounting**: every event subscription made through the
//!   sandbox is tracked and taken back off the platform on reset
//! - **Failure containment**: errors in loaded code become user notices with
//!   a source location instead of crashing the host
//!
//! ## Example
//!
//! ```rust,ignore
//! use live_sandbox::prelude::*;
//! use std::rc::Rc;
//!
//! let bus = Rc::new(EventBus::new());
//! let sandbox = Sandbox::builder(SandboxConfig::builder().resources_dir("app/Resources").build())
//!     .platform(bus.clone())
//!     .build()?;
//!
//! // Load a new bundle: resets the sandbox, then evaluates app.rhai.
//! let exports = sandbox.require("app", RequireOptions::root());
//!
//! // Fire an event at whatever the bundle subscribed.
//! sandbox.dispatch(&bus, "App", "resume", Dynamic::UNIT);
//! ```
//!
//! ## Isolation
//!
//! The sandbox is about resetting state, not about security. Loaded code runs
//! with whatever functions the host registers, bounded only by the engine
//! limits in [`EngineLimits`].

pub mod error;
pub mod prelude;
pub mod sandbox;

// Re-export main types at crate root for convenience
pub use error::{Exception, FailureKind, Result, SandboxError};
pub use rhai::{Dynamic, Map};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder};
pub use sandbox::events::{EventBus, EventPlatform, EventRegistry, Listener};
pub use sandbox::io::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use sandbox::limits::EngineLimits;
pub use sandbox::loader::RequireOptions;
pub use sandbox::native::{NativeModules, NativeRegistry};
pub use sandbox::report::{LogNotifier, Notice, Notifier, RecordingNotifier};
pub use sandbox::resolver::ResourceResolver;
pub use sandbox::runtime::{Sandbox, SandboxBuilder};
pub use sandbox::transform::{Capabilities, Passthrough, SourceTransform};
