//! Error types for the live sandbox.
//!
//! Two families live here. [`SandboxError`] covers conditions that break the
//! sandbox's own consistency (bad configuration, a platform event system that
//! refuses to let go of listeners). [`Exception`] covers everything that can go
//! wrong while loading or running guest code; those are contained at the
//! `require` boundary and shown to the user instead of being propagated.

use std::fmt;

use rhai::{Dynamic, EvalAltResult, ParseError, Position};
use thiserror::Error;

/// Message shown when a failure carries no message of its own.
pub const UNKNOWN_MESSAGE: &str = "Unknown Uncaught Exception";

/// Errors that break the sandbox itself rather than a guest module.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The sandbox configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The platform event system rejected a registration or removal.
    #[error("platform event system failed: {0}")]
    Platform(#[source] anyhow::Error),

    /// Draining the event registry left listeners behind on the platform.
    #[error("{failed} of {attempted} listener removals failed during reset")]
    Drain {
        /// Number of removals issued.
        attempted: usize,
        /// Number of removals the platform rejected.
        failed: usize,
        /// The first rejection reported by the platform.
        #[source]
        first: anyhow::Error,
    },

    /// A script-side handle outlived the sandbox that created it.
    #[error("sandbox has been dropped")]
    Detached,
}

impl SandboxError {
    /// Check if this error is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, SandboxError::Config(_))
    }

    /// Check if this error came from the platform event system.
    pub fn is_platform(&self) -> bool {
        matches!(self, SandboxError::Platform(_) | SandboxError::Drain { .. })
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Which stage of the module pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Reading the resolved source file failed.
    Read,
    /// The host source transformation rejected the source.
    Transform,
    /// The transformed source does not parse.
    Syntax,
    /// Evaluation raised an error, including limit violations.
    Runtime,
    /// The native module fallback failed or does not know the identifier.
    Native,
    /// The module is already being evaluated further up the require chain.
    Cycle,
    /// Guest code reported the failure itself through `__proxy.exception`.
    Script,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Read => "read",
            FailureKind::Transform => "transform",
            FailureKind::Syntax => "syntax",
            FailureKind::Runtime => "runtime",
            FailureKind::Native => "native",
            FailureKind::Cycle => "cycle",
            FailureKind::Script => "script",
        };
        f.write_str(name)
    }
}

/// A contained failure with best-effort source attribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {}", .message.as_deref().unwrap_or(UNKNOWN_MESSAGE))]
pub struct Exception {
    /// Pipeline stage that failed.
    pub kind: FailureKind,
    /// Source file the failure is attributed to, if known.
    pub filename: Option<String>,
    /// 1-based line, if known.
    pub line: Option<usize>,
    /// 1-based column, if known.
    pub column: Option<usize>,
    /// Human readable message.
    pub message: Option<String>,
}

impl Exception {
    /// Create an exception with a message and no location.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            filename: None,
            line: None,
            column: None,
            message: Some(message.into()),
        }
    }

    /// Attribute the exception to `filename`.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Attribute the exception to `filename` unless it already names a file.
    pub fn or_filename(mut self, filename: &str) -> Self {
        if self.filename.is_none() {
            self.filename = Some(filename.to_string());
        }
        self
    }

    /// Fill in line and column from a script position.
    pub(crate) fn at(mut self, position: Position) -> Self {
        if self.line.is_none() {
            self.line = position.line();
            self.column = position.position();
        }
        self
    }

    /// Convert a parse failure of transformed source.
    pub(crate) fn from_parse(err: &ParseError) -> Self {
        Exception::new(FailureKind::Syntax, err.err_type().to_string()).at(err.position())
    }

    /// Convert an evaluation failure.
    ///
    /// A value thrown by the script keeps whatever attribution it carries;
    /// engine errors contribute their message and position.
    pub(crate) fn from_eval(err: Box<EvalAltResult>) -> Self {
        let mut err = *err;
        let position = err.take_position();
        match err {
            EvalAltResult::ErrorRuntime(value, _) => {
                let mut exception = Exception::from_value(&value);
                exception.kind = FailureKind::Runtime;
                exception.at(position)
            }
            other => Exception::new(FailureKind::Runtime, other.to_string()).at(position),
        }
    }

    /// Build an exception from a script value.
    ///
    /// Object maps contribute `message`, `filename` (or `source`), `line` and
    /// `column` (or `col`, or `position`). Any other value becomes the message.
    pub fn from_value(value: &Dynamic) -> Self {
        let Some(map) = value.read_lock::<rhai::Map>() else {
            let message = if value.is_string() {
                value.clone().into_string().unwrap_or_default()
            } else {
                value.to_string()
            };
            return Exception::new(FailureKind::Script, message);
        };

        let text = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_unit())
                .map(|v| v.clone().into_string().unwrap_or_else(|_| v.to_string()))
                .filter(|s| !s.is_empty())
        };
        let number = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| map.get(*key))
                .find_map(|v| v.as_int().ok())
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
        };

        Exception {
            kind: FailureKind::Script,
            filename: text("filename").or_else(|| text("source")),
            line: number(&["line"]),
            column: number(&["column", "col", "position"]),
            message: text("message"),
        }
    }
}
