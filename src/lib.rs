//! # pdfscout
//!
//! Find the PDFs a web page is or links to, OCR one of them with the
//! Mistral OCR API, and clean up the Markdown that comes back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! tab URL
//!  │
//!  ├─ 1. Locate     the tab itself if it is a PDF, plus PDF links/embeds/frames
//!  ├─ 2. Select     one candidate (first by default)
//!  ├─ 3. Fetch      best-effort local download → data: URL (else send the URL)
//!  ├─ 4. OCR        one POST to /v1/ocr, pages[].markdown joined by `---`
//!  ├─ 5. Normalise  collapse repetition loops and formula artifacts, format images
//!  └─ 6. Output     copy (OSC 52) or save as <name>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscout::{Credential, HttpOcrTransport, NoopStatusSink, OcrConfig, Popup, WebTabHost};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::default();
//!     let host = WebTabHost::new(
//!         Some("https://arxiv.org/pdf/1706.03762.pdf".into()),
//!         None,
//!         Duration::from_secs(30),
//!     )?;
//!     let transport = Arc::new(HttpOcrTransport::new(&config)?);
//!     let key = Credential::new(&std::env::var("MISTRAL_API_KEY")?);
//!
//!     let mut popup = Popup::new(config, host, transport, Arc::new(NoopStatusSink), key);
//!     popup.detect().await?;
//!     let out = popup.process().await?;
//!     println!("{}", out.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfscout` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfscout = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod popup;
pub mod session;
pub mod status;
pub mod tab;

#[cfg(test)]
mod test_server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{NormalizeRules, OcrConfig, OcrConfigBuilder, PageSeparator};
pub use error::{RecoverableError, ScoutError};
pub use output::{
    copy_to_clipboard, download_markdown, markdown_filename, render_preview, write_markdown,
};
pub use pipeline::locate::{
    locate_documents, ActiveTab, Detection, DocumentReference, TabHost,
};
pub use pipeline::normalize::{normalize, normalize_markdown};
pub use pipeline::ocr::{
    extract_markdown, submit, HttpOcrTransport, OcrOutput, OcrRequest, OcrTransport,
};
pub use popup::Popup;
pub use session::{Credential, DocumentListView, DocumentRow, Session};
pub use status::{NoopStatusSink, SharedStatusSink, Status, StatusKind, StatusSink};
pub use tab::WebTabHost;
