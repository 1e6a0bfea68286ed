//! Sandbox configuration with builder pattern.

use crate::error::{Result, SandboxError};
use crate::sandbox::limits::EngineLimits;

/// Configuration for the live sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Resource root every module and resource path is resolved against.
    pub resources_dir: String,
    /// Separator used to join and strip paths.
    pub separator: char,
    /// Platform-override subdirectory probed before the plain root.
    pub platform_dir: Option<String>,
    /// Highest density tier when the platform supports density-suffixed
    /// images (`@2x`, `@3x`, ...); `None` disables density probing.
    pub density: Option<u8>,
    /// Extensions (with leading dot) eligible for density probing.
    pub image_extensions: Vec<String>,
    /// Extension (without dot) of module source files.
    pub script_extension: String,
    /// Copy top-level variables of a root module into the globals map.
    pub capture_root_globals: bool,
    /// Limits applied to the script engine.
    pub limits: EngineLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            resources_dir: "Resources".to_string(),
            separator: '/',
            platform_dir: None,
            density: None,
            image_extensions: vec![".png".to_string(), ".jpg".to_string()],
            script_extension: "rhai".to_string(),
            capture_root_globals: true,
            limits: EngineLimits::default(),
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Reject configurations the resolver cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.resources_dir.trim_end_matches(self.separator).is_empty()
            && !self.resources_dir.starts_with(self.separator)
        {
            return Err(SandboxError::Config("resource root is empty".to_string()));
        }
        if self.script_extension.is_empty() {
            return Err(SandboxError::Config("script extension is empty".to_string()));
        }
        if self.platform_dir.as_deref() == Some("") {
            return Err(SandboxError::Config(
                "platform directory must be omitted rather than empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    resources_dir: Option<String>,
    separator: Option<char>,
    platform_dir: Option<String>,
    density: Option<u8>,
    image_extensions: Option<Vec<String>>,
    script_extension: Option<String>,
    capture_root_globals: Option<bool>,
    limits: Option<EngineLimits>,
}

impl SandboxConfigBuilder {
    /// Set the resource root.
    pub fn resources_dir(mut self, dir: impl Into<String>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }

    /// Set the path separator.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Set the platform-override subdirectory.
    pub fn platform_dir(mut self, dir: impl Into<String>) -> Self {
        self.platform_dir = Some(dir.into());
        self
    }

    /// Enable density-suffixed image probing up to `tier` (e.g. 3 for `@3x`).
    pub fn density(mut self, tier: u8) -> Self {
        self.density = Some(tier);
        self
    }

    /// Replace the list of image extensions eligible for density probing.
    pub fn image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Set the module source extension (without dot).
    pub fn script_extension(mut self, extension: impl Into<String>) -> Self {
        self.script_extension = Some(extension.into());
        self
    }

    /// Toggle capture of root-module variables into the globals map.
    pub fn capture_root_globals(mut self, capture: bool) -> Self {
        self.capture_root_globals = Some(capture);
        self
    }

    /// Set the script engine limits.
    pub fn limits(mut self, limits: EngineLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            resources_dir: self.resources_dir.unwrap_or(default.resources_dir),
            separator: self.separator.unwrap_or(default.separator),
            platform_dir: self.platform_dir.or(default.platform_dir),
            density: self.density.or(default.density),
            image_extensions: self.image_extensions.unwrap_or(default.image_extensions),
            script_extension: self.script_extension.unwrap_or(default.script_extension),
            capture_root_globals: self
                .capture_root_globals
                .unwrap_or(default.capture_root_globals),
            limits: self.limits.unwrap_or(default.limits),
        }
    }
}
