//! Resource path virtualization.
//!
//! Maps a logical resource path onto a concrete file under the resource root,
//! preferring platform overrides and density-suffixed image variants.

use tracing::debug;

use crate::sandbox::config::SandboxConfig;
use crate::sandbox::io::FileSystem;

/// Resolves logical resource paths against the resource root.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    /// Resource root without trailing separators.
    root: String,
    separator: char,
    platform_dir: Option<String>,
    density: Option<u8>,
    image_extensions: Vec<String>,
}

impl ResourceResolver {
    /// Create a resolver from the sandbox configuration.
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            root: config
                .resources_dir
                .trim_end_matches(config.separator)
                .to_string(),
            separator: config.separator,
            platform_dir: config.platform_dir.clone(),
            density: config.density,
            image_extensions: config.image_extensions.clone(),
        }
    }

    /// The resource root with exactly one trailing separator.
    pub fn root_dir(&self) -> String {
        format!("{}{}", self.root, self.separator)
    }

    /// Join path segments with the separator.
    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut joined = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() {
                continue;
            }
            if joined.is_empty() {
                joined.push_str(segment);
                continue;
            }
            let head = joined.trim_end_matches(self.separator).len();
            joined.truncate(head);
            joined.push(self.separator);
            joined.push_str(segment.trim_start_matches(self.separator));
        }
        joined
    }

    /// Strip the resource root from `path` if `path` lies below it.
    pub fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        match path.strip_prefix(self.root.as_str()) {
            Some(rest) if rest.is_empty() => rest,
            Some(rest) if rest.starts_with(self.separator) => &rest[self.separator.len_utf8()..],
            _ => path,
        }
    }

    /// Whether a path is remote and therefore never virtualized.
    pub fn is_remote(path: &str) -> bool {
        path.starts_with("http://") || path.starts_with("https://")
    }

    /// Concrete locations probed for `path`, in priority order.
    pub fn candidates(&self, path: &str) -> Vec<String> {
        let path = self.relative_path(path);
        let mut candidates = Vec::new();

        if let Some(top) = self.density.filter(|_| self.is_image(path)) {
            for tier in (2..=top).rev() {
                let suffixed = self.inject_suffix(path, &format!("@{tier}x"));
                if let Some(dir) = &self.platform_dir {
                    candidates.push(self.under_root(&[dir, &suffixed]));
                }
                candidates.push(self.under_root(&[&suffixed]));
            }
        }

        if let Some(dir) = &self.platform_dir {
            candidates.push(self.under_root(&[dir, path]));
        }
        candidates.push(self.under_root(&[path]));
        candidates
    }

    /// Resolve `path` to the first existing candidate.
    ///
    /// Remote paths are never resolved.
    pub fn resolve(&self, fs: &dyn FileSystem, path: &str) -> Option<String> {
        if Self::is_remote(path) {
            debug!(path, "remote resource is not virtualized");
            return None;
        }

        let resolved = self
            .candidates(path)
            .into_iter()
            .find(|candidate| fs.exists(candidate));

        match &resolved {
            Some(location) => debug!(path, %location, "resource resolved"),
            None => debug!(path, "resource unresolved"),
        }
        resolved
    }

    /// Directory part of a resolved location.
    pub fn dirname<'a>(&self, path: &'a str) -> &'a str {
        path.rfind(self.separator).map_or("", |idx| &path[..idx])
    }

    fn is_image(&self, path: &str) -> bool {
        let ext = self.extname(path);
        !ext.is_empty() && self.image_extensions.iter().any(|e| e == ext)
    }

    /// Extension including the dot, or "" when the file name has none.
    fn extname<'a>(&self, path: &'a str) -> &'a str {
        let name_start = path.rfind(self.separator).map_or(0, |idx| idx + 1);
        match path[name_start..].rfind('.') {
            Some(0) | None => "",
            Some(dot) => &path[name_start + dot..],
        }
    }

    /// Insert `suffix` before the extension: `img/logo.png` -> `img/logo@2x.png`.
    fn inject_suffix(&self, path: &str, suffix: &str) -> String {
        let ext = self.extname(path);
        let stem = &path[..path.len() - ext.len()];
        format!("{stem}{suffix}{ext}")
    }

    fn under_root(&self, parts: &[&str]) -> String {
        let mut location = self.root_dir();
        location.push_str(&self.join(parts));
        location
    }
}
