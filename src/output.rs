//! Output actions: download as a `.md` file, copy to the clipboard.

use crate::error::ScoutError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use crate::pipeline::normalize::render_preview;

const FALLBACK_STEM: &str = "document";

/// File name for the exported Markdown of a document called `name`.
///
/// A trailing `.pdf` (any case) is dropped and path separators become `_`.
pub fn markdown_filename(name: &str) -> String {
    let trimmed = name.trim();
    let stem = if trimmed.to_ascii_lowercase().ends_with(".pdf") {
        &trimmed[..trimmed.len() - 4]
    } else {
        trimmed
    };
    let stem: String = stem
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        format!("{FALLBACK_STEM}.md")
    } else {
        format!("{stem}.md")
    }
}

/// Write `markdown` to `<dir>/<markdown_filename(name)>` and return the path.
pub fn download_markdown(markdown: &str, name: &str, dir: &Path) -> Result<PathBuf, ScoutError> {
    let path = dir.join(markdown_filename(name));
    write_markdown(markdown, &path)?;
    Ok(path)
}

/// Write `markdown` to `path`, creating parent directories.
///
/// The text goes to a temporary sibling first and is then moved into
/// place, so a failed write never leaves a partial file behind.
pub fn write_markdown(markdown: &str, path: &Path) -> Result<(), ScoutError> {
    if markdown.is_empty() {
        return Err(ScoutError::NothingToExport);
    }
    let write_failed = |source: std::io::Error| ScoutError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_failed)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(markdown.as_bytes()).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    info!("Saved {} bytes to {}", markdown.len(), path.display());
    Ok(())
}

/// Put `markdown` on the clipboard with an OSC 52 escape written to `term`.
///
/// Terminals that support OSC 52 forward the payload to the system
/// clipboard; the rest ignore it silently.
pub fn copy_to_clipboard<W: Write>(markdown: &str, term: &mut W) -> Result<(), ScoutError> {
    if markdown.is_empty() {
        return Err(ScoutError::ClipboardFailed {
            reason: "nothing to copy".to_string(),
        });
    }
    let payload = STANDARD.encode(markdown.as_bytes());
    debug!("OSC 52 payload: {} bytes", payload.len());

    write!(term, "\x1b]52;c;{payload}\x07")
        .and_then(|_| term.flush())
        .map_err(|e| ScoutError::ClipboardFailed {
            reason: e.to_string(),
        })
}
