//! Error types for the pdfscout library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScoutError`]: **Fatal** for the operation that raised it (no active
//!   tab, missing API key, OCR API rejected the request). Returned as
//!   `Err(ScoutError)` and surfaced to the user through the status line.
//!
//! * [`RecoverableError`]: **Non-fatal**: the page could not be inspected
//!   or the document could not be fetched locally. The pipeline logs it and
//!   degrades (fewer candidates, or the raw URL is sent instead of the bytes).

use keyslot::KeySlotError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfscout library.
#[derive(Debug, Error)]
pub enum ScoutError {
    // ── Detection errors ──────────────────────────────────────────────────
    /// There is no page to inspect at all.
    #[error("No active tab found.\nPass a page URL or set PDFSCOUT_TAB.")]
    NoActiveTab,

    // ── Submission errors ─────────────────────────────────────────────────
    /// The API key or the document selection is missing.
    #[error("Missing {what}")]
    MissingInput { what: &'static str },

    /// A selection index outside the current document list.
    #[error("Selection {index} is out of range ({len} documents detected)")]
    InvalidSelection { index: usize, len: usize },

    /// The OCR endpoint answered with a non-success status.
    #[error("{message}")]
    ApiError { message: String },

    /// The OCR request never produced a usable reply.
    #[error("OCR request failed: {reason}")]
    Transport { reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// There is no OCR result to copy or download yet.
    #[error("Nothing to export: process a document first")]
    NothingToExport,

    /// Could not create or write the downloaded Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the clipboard failed.
    #[error("Copy failed: {reason}")]
    ClipboardFailed { reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The persisted credential could not be read or written.
    #[error(transparent)]
    Credential(#[from] KeySlotError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure the pipeline recovers from locally.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RecoverableError {
    /// The page could not be inspected for links (restricted page, not HTML,
    /// unreachable). Treated as "no extra candidates".
    #[error("Page inspection unavailable for '{url}': {reason}")]
    ContentScriptUnavailable { url: String, reason: String },

    /// The document bytes could not be fetched locally; the raw URL is sent
    /// to the OCR service instead.
    #[error("Could not fetch '{url}' locally: {reason}")]
    DocumentFetchFailed { url: String, reason: String },
}

/// Build the user-facing message for a non-success OCR reply.
///
/// Uses the server-supplied `message` field when the body is JSON carrying
/// one, otherwise falls back to the HTTP status code.
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("API Error: {status}"))
}
