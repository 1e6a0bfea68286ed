//! Host-supplied source transformation.

/// Interception categories a transformation may enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Rewrite resource paths through `__proxy.resource`.
    pub resource: bool,
    /// Route uncaught errors to `__proxy.exception`.
    pub exception: bool,
    /// Intercept attempts to exit the process.
    pub exit: bool,
    /// Route event subscriptions through `__proxy.events`.
    pub events: bool,
    /// Capture top-level variables as sandbox globals.
    pub globals: bool,
}

impl Capabilities {
    /// Capabilities for one module load. Global capture is root-only.
    pub fn for_load(root: bool) -> Self {
        Self {
            resource: true,
            exception: true,
            exit: true,
            events: true,
            globals: root,
        }
    }
}

/// Rewrites module source before evaluation. Text in, text out.
pub trait SourceTransform {
    /// Transform `source` with the given capabilities enabled.
    fn transform(&self, source: &str, capabilities: Capabilities) -> anyhow::Result<String>;
}

impl<F> SourceTransform for F
where
    F: Fn(&str, Capabilities) -> anyhow::Result<String>,
{
    fn transform(&self, source: &str, capabilities: Capabilities) -> anyhow::Result<String> {
        self(source, capabilities)
    }
}

/// Leaves source untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl SourceTransform for Passthrough {
    fn transform(&self, source: &str, _capabilities: Capabilities) -> anyhow::Result<String> {
        Ok(source.to_string())
    }
}
