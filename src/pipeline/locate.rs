//! Document location: find the PDFs the active tab points at.
//!
//! Candidates come from two places, in this order:
//!
//! 1. The tab itself, when its URL ends in `.pdf` (case-insensitive).
//! 2. The page content: every `<a href>` containing `.pdf`, then every
//!    `<embed src>` / `<iframe src>` containing `.pdf`.
//!
//! The merged list is deduplicated by URL; the first occurrence wins and
//! keeps its position. Page inspection is best-effort: a restricted or
//! non-HTML page contributes nothing, while a missing tab aborts the pass.

use crate::error::{RecoverableError, ScoutError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

static SEL_PDF_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*=".pdf"]"#).unwrap());

static SEL_PDF_FRAMES: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"embed[src*=".pdf"], iframe[src*=".pdf"]"#).unwrap());

static SEL_BASE: Lazy<Selector> = Lazy::new(|| Selector::parse("base[href]").unwrap());

/// A detected PDF candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub name: String,
    pub url: String,
}

/// The tab being inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTab {
    pub url: String,
    pub title: Option<String>,
}

/// Access to the host's active tab.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// The active tab, or `None` when there is none.
    async fn active_tab(&self) -> Option<ActiveTab>;

    /// Run the read-only link query against the tab's page.
    async fn inspect_page(
        &self,
        tab: &ActiveTab,
    ) -> Result<Vec<DocumentReference>, RecoverableError>;
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub documents: Vec<DocumentReference>,
    /// Why the page could not be inspected, if it could not.
    pub inspection_error: Option<RecoverableError>,
}

impl Detection {
    /// The inspection error, when it left the candidate list empty.
    pub fn blocking_error(&self) -> Option<&RecoverableError> {
        if self.documents.is_empty() {
            self.inspection_error.as_ref()
        } else {
            None
        }
    }
}

/// Produce the deduplicated candidate list for the active tab.
///
/// # Errors
/// [`ScoutError::NoActiveTab`] when the host reports no tab. Inspection
/// failures are logged and carried in [`Detection::inspection_error`].
pub async fn locate_documents(host: &dyn TabHost) -> Result<Detection, ScoutError> {
    let tab = host.active_tab().await.ok_or(ScoutError::NoActiveTab)?;
    info!("Detecting PDFs for tab: {}", tab.url);

    let mut found = Vec::new();
    if let Some(candidate) = tab_candidate(&tab) {
        debug!("Tab itself is a PDF: {}", candidate.url);
        found.push(candidate);
    }

    let inspection_error = match host.inspect_page(&tab).await {
        Ok(links) => {
            debug!("Page inspection found {} PDF reference(s)", links.len());
            found.extend(links);
            None
        }
        Err(e) => {
            warn!("{}", e);
            Some(e)
        }
    };

    let documents = dedup_by_url(found);
    info!("Detected {} PDF(s)", documents.len());
    Ok(Detection {
        documents,
        inspection_error,
    })
}

/// The tab itself as a candidate, when its URL names a PDF.
pub fn tab_candidate(tab: &ActiveTab) -> Option<DocumentReference> {
    if !tab.url.to_lowercase().ends_with(".pdf") {
        return None;
    }
    let name = tab
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| last_segment(&tab.url))
        .to_string();
    Some(DocumentReference {
        name,
        url: tab.url.clone(),
    })
}

/// Drop repeated URLs, keeping the first occurrence in place.
pub fn dedup_by_url(docs: Vec<DocumentReference>) -> Vec<DocumentReference> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|d| seen.insert(d.url.clone()))
        .collect()
}

/// Collect PDF links, embeds and frames from an HTML page.
///
/// Relative references are resolved against `<base href>` when present,
/// else against `page_url`. References that cannot be resolved are skipped.
pub fn scan_html(html: &str, page_url: &Url) -> Vec<DocumentReference> {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url);

    let mut found = Vec::new();

    for link in document.select(&SEL_PDF_LINKS) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve(&base, href) else {
            continue;
        };
        let text = link.text().collect::<String>();
        let text = text.trim();
        let name = if text.is_empty() {
            last_segment(&url).to_string()
        } else {
            text.to_string()
        };
        found.push(DocumentReference { name, url });
    }

    for elem in document.select(&SEL_PDF_FRAMES) {
        let Some(src) = elem.value().attr("src") else {
            continue;
        };
        let Some(url) = resolve(&base, src) else {
            continue;
        };
        found.push(DocumentReference {
            name: last_segment(&url).to_string(),
            url,
        });
    }

    found
}

fn base_url(document: &Html, page_url: &Url) -> Url {
    document
        .select(&SEL_BASE)
        .next()
        .and_then(|b| b.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve(base: &Url, reference: &str) -> Option<String> {
    match base.join(reference.trim()) {
        Ok(u) => Some(u.to_string()),
        Err(e) => {
            debug!("Skipping unresolvable reference '{}': {}", reference, e);
            None
        }
    }
}

/// Text after the final `/`.
pub fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
