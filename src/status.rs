//! Status-line events emitted while detecting and processing documents.
//!
//! Inject an [`Arc<dyn StatusSink>`] into [`crate::popup::Popup`] to receive
//! the same three-mode status line a user would see: in progress, success,
//! or error. Success statuses carry an auto-clear delay; the sink decides how
//! to honour it (the CLI lets its spinner finish, a GUI would start a timer).
//!
//! # Example
//!
//! ```rust
//! use pdfscout::{Status, StatusKind, StatusSink};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<StatusKind>>,
//! }
//!
//! impl StatusSink for Recorder {
//!     fn show(&self, status: &Status) {
//!         self.seen.lock().unwrap().push(status.kind);
//!     }
//! }
//!
//! let rec = Arc::new(Recorder::default());
//! rec.show(&Status::in_progress("Downloading PDF..."));
//! assert_eq!(rec.seen.lock().unwrap().as_slice(), &[StatusKind::InProgress]);
//! ```

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Visual mode of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusKind {
    InProgress,
    Success,
    Error,
}

/// One status-line update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
    /// Delay after which a success status should disappear.
    #[serde(skip)]
    pub clear_after: Option<Duration>,
}

impl Status {
    pub fn in_progress(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::InProgress,
            message: message.into(),
            clear_after: None,
        }
    }

    pub fn success(message: impl Into<String>, clear_after: Duration) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
            clear_after: Some(clear_after),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
            clear_after: None,
        }
    }

    /// How long the status stays visible, if it clears itself.
    pub fn auto_clear_after(&self) -> Option<Duration> {
        match self.kind {
            StatusKind::Success => self.clear_after,
            _ => None,
        }
    }

    /// Status text with its mode marker, as shown on a terminal.
    pub fn display_line(&self) -> String {
        let marker = match self.kind {
            StatusKind::InProgress => "⏳",
            StatusKind::Success => "✅",
            StatusKind::Error => "❌",
        };
        format!("{marker} {}", self.message)
    }
}

/// Receives status-line updates.
///
/// Both methods default to no-ops so implementations override only what
/// they render.
pub trait StatusSink: Send + Sync {
    /// Replace the current status.
    fn show(&self, status: &Status) {
        let _ = status;
    }

    /// Hide the status line.
    fn clear(&self) {}
}

/// A sink that ignores every update. Default when none is configured.
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {}

/// Convenience alias for the type stored in [`crate::popup::Popup`].
pub type SharedStatusSink = Arc<dyn StatusSink>;

/// Success message reporting extracted size in whole kilobytes.
pub fn extracted_message(markdown_len: usize) -> String {
    let kb = (markdown_len as f64 / 1000.0).round() as u64;
    format!("Done! {kb}KB extracted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        shown: Mutex<Vec<Status>>,
        clears: Mutex<usize>,
    }

    impl StatusSink for Recorder {
        fn show(&self, status: &Status) {
            self.shown.lock().unwrap().push(status.clone());
        }

        fn clear(&self) {
            *self.clears.lock().unwrap() += 1;
        }
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let sink = NoopStatusSink;
        sink.show(&Status::in_progress("working"));
        sink.show(&Status::error("bad"));
        sink.clear();
    }

    #[test]
    fn only_success_auto_clears() {
        let ok = Status::success("done", Duration::from_millis(3000));
        assert_eq!(ok.auto_clear_after(), Some(Duration::from_millis(3000)));
        assert_eq!(Status::in_progress("x").auto_clear_after(), None);
        assert_eq!(Status::error("x").auto_clear_after(), None);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.show(&Status::in_progress("Downloading PDF..."));
        rec.show(&Status::success("ok", Duration::from_secs(1)));
        rec.clear();
        let shown = rec.shown.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].kind, StatusKind::Success);
        assert_eq!(*rec.clears.lock().unwrap(), 1);
    }

    #[test]
    fn display_line_has_marker() {
        assert!(Status::error("boom").display_line().starts_with("❌"));
        assert!(Status::in_progress("wait").display_line().ends_with("wait"));
    }

    #[test]
    fn extracted_message_rounds_kilobytes() {
        assert_eq!(extracted_message(0), "Done! 0KB extracted");
        assert_eq!(extracted_message(1499), "Done! 1KB extracted");
        assert_eq!(extracted_message(1500), "Done! 2KB extracted");
    }
}
