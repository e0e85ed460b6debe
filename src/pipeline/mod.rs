//! Pipeline stages from the active tab to clean Markdown.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! locate ──▶ fetch ──▶ ocr ──▶ normalize
//! (tab/page)  (bytes)   (API)   (cleanup)
//! ```
//!
//! 1. [`locate`] - list the PDFs the tab is or links to
//! 2. [`fetch`] - best-effort local download, wrapped as a `data:` URL
//! 3. [`ocr`] - the single OCR request and text extraction; the only
//!    stage that talks to the OCR service
//! 4. [`normalize`] - deterministic cleanup of OCR artifacts (runaway
//!    repetitions, formula loops, bare image references)

pub mod fetch;
pub mod locate;
pub mod normalize;
pub mod ocr;
