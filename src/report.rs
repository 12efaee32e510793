//! Per-file reporting.
//!
//! Sources never raise per-file failures. They hand them to a [`Reporter`]
//! owned by the caller and keep going. Only discovery failures come back as
//! an `Err` from [`Source::trigger`](crate::source::Source::trigger).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Sink for per-file outcomes of a `trigger` call.
///
/// Calls arrive sequentially, one item at a time.
pub trait Reporter {
    /// A single discovered file could not be fetched or stored.
    ///
    /// `detail` carries whatever the server or filesystem said (response
    /// body, OS error text); it may be empty.
    fn file_error(&mut self, url: &str, message: &str, detail: &str);

    /// A file was written to `path`. Optional for implementers.
    fn file_complete(&mut self, url: &str, name: &str, path: &Path) {
        let _ = (url, name, path);
    }
}

// ---------------------------------------------------------------------------
// LogReporter
// ---------------------------------------------------------------------------

/// Writes every outcome to the tracing subscriber and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn file_error(&mut self, url: &str, message: &str, detail: &str) {
        warn!(url, detail, "{message}");
    }

    fn file_complete(&mut self, url: &str, name: &str, path: &Path) {
        info!(url, name, path = %path.display(), "Fetched");
    }
}

// ---------------------------------------------------------------------------
// CollectingReporter
// ---------------------------------------------------------------------------

/// One recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Error {
        url: String,
        message: String,
        detail: String,
        at: DateTime<Utc>,
    },
    Complete {
        url: String,
        name: String,
        path: PathBuf,
        at: DateTime<Utc>,
    },
}

impl FileEvent {
    pub fn url(&self) -> &str {
        match self {
            FileEvent::Error { url, .. } | FileEvent::Complete { url, .. } => url,
        }
    }
}

/// Keeps every outcome in memory, optionally forwarding to another
/// reporter as well.
///
/// The CLI uses this to print a summary and pick an exit code; tests use it
/// to assert on what a source reported.
#[derive(Default)]
pub struct CollectingReporter {
    events: Vec<FileEvent>,
    forward: Option<Box<dyn Reporter + Send>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also pass every event on to `inner`.
    pub fn forwarding_to(inner: impl Reporter + Send + 'static) -> Self {
        Self {
            events: Vec::new(),
            forward: Some(Box::new(inner)),
        }
    }

    pub fn events(&self) -> &[FileEvent] {
        &self.events
    }

    pub fn errors(&self) -> impl Iterator<Item = &FileEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, FileEvent::Error { .. }))
    }

    pub fn completed(&self) -> impl Iterator<Item = &FileEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, FileEvent::Complete { .. }))
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn file_error(&mut self, url: &str, message: &str, detail: &str) {
        if let Some(inner) = self.forward.as_mut() {
            inner.file_error(url, message, detail);
        }
        self.events.push(FileEvent::Error {
            url: url.to_string(),
            message: message.to_string(),
            detail: detail.to_string(),
            at: Utc::now(),
        });
    }

    fn file_complete(&mut self, url: &str, name: &str, path: &Path) {
        if let Some(inner) = self.forward.as_mut() {
            inner.file_complete(url, name, path);
        }
        self.events.push(FileEvent::Complete {
            url: url.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
            at: Utc::now(),
        });
    }
}
