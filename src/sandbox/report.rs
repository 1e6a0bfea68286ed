//! User-facing failure reports.

use std::cell::RefCell;

use tracing::error;

use crate::error::{Exception, UNKNOWN_MESSAGE};

/// A titled message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Source location, when one is known.
    pub title: Option<String>,
    /// What went wrong.
    pub message: String,
}

/// Presents notices to the user.
pub trait Notifier {
    /// Show `notice`. Implementations may block until it is dismissed.
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        error!(
            title = notice.title.as_deref().unwrap_or(""),
            "{}", notice.message
        );
    }
}

/// Keeps every notice it is shown.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices shown so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    /// Number of notices shown so far.
    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    /// Check if nothing was shown.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget recorded notices.
    pub fn clear(&self) {
        self.notices.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.borrow_mut().push(notice.clone());
    }
}

/// Display location `path[:line[:column]]`; the column needs a line.
pub fn display_location(path: &str, line: Option<usize>, column: Option<usize>) -> String {
    let mut location = path.to_string();
    if let Some(line) = line {
        location.push_str(&format!(":{line}"));
        if let Some(column) = column {
            location.push_str(&format!(":{column}"));
        }
    }
    location
}

/// Build the notice for `exception`, with `relative` mapping a source file
/// to its display path.
pub fn notice_for<'a>(exception: &'a Exception, relative: impl Fn(&'a str) -> &'a str) -> Notice {
    Notice {
        title: exception
            .filename
            .as_deref()
            .map(|file| display_location(relative(file), exception.line, exception.column)),
        message: exception
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string()),
    }
}
