//! Raw file access used by the resolver and the loader.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Host file access.
pub trait FileSystem {
    /// Whether a readable file exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Read the whole file at `path` as UTF-8 text.
    fn read_text(&self, path: &str) -> io::Result<String>;
}

/// File access backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn read_text(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// An in-memory file tree keyed by full path.
///
/// Counts reads per path, which makes "evaluated at most once" observable.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RefCell<HashMap<String, String>>,
    reads: RefCell<HashMap<String, usize>>,
}

impl MemoryFileSystem {
    /// Create an empty file tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file.
    pub fn insert(&self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    /// Remove a file, returning `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.borrow_mut().remove(path).is_some()
    }

    /// Number of successful reads of `path`.
    pub fn read_count(&self, path: &str) -> usize {
        self.reads.borrow().get(path).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read_text(&self, path: &str) -> io::Result<String> {
        let text = self.files.borrow().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })?;
        *self.reads.borrow_mut().entry(path.to_string()).or_default() += 1;
        Ok(text)
    }
}
