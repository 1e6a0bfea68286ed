//! Prelude module for convenient imports.

pub use crate::error::{Exception, FailureKind, Result, SandboxError};
pub use crate::sandbox::{
    config::SandboxConfig,
    events::{EventBus, Listener},
    loader::RequireOptions,
    report::{Notice, RecordingNotifier},
    runtime::Sandbox,
    transform::Capabilities,
};
pub use rhai::{Dynamic, Map};
