//! Session state: credential, detected documents, selection, last result.
//!
//! A [`Session`] lives for one run. Detection replaces the document list and
//! resets the selection to the first entry; the OCR result is held until the
//! session is dropped. The selection invariant (`selected` always indexes
//! into `documents`) is enforced here and nowhere else.

use crate::error::ScoutError;
use crate::pipeline::locate::DocumentReference;
use serde::Serialize;
use std::fmt;

/// An OCR API key. Trimmed, never empty, and redacted when printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw key, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Mutable state of one popup session.
#[derive(Debug, Default)]
pub struct Session {
    credential: Option<Credential>,
    documents: Vec<DocumentReference>,
    selected: Option<usize>,
    result_markdown: String,
    busy: bool,
}

impl Session {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            credential,
            ..Self::default()
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    pub fn documents(&self) -> &[DocumentReference] {
        &self.documents
    }

    /// Replace the candidate list; the first entry becomes selected.
    pub fn replace_documents(&mut self, documents: Vec<DocumentReference>) {
        self.selected = if documents.is_empty() { None } else { Some(0) };
        self.documents = documents;
    }

    /// Select a document by 0-based index.
    pub fn select(&mut self, index: usize) -> Result<(), ScoutError> {
        if index >= self.documents.len() {
            return Err(ScoutError::InvalidSelection {
                index,
                len: self.documents.len(),
            });
        }
        self.selected = Some(index);
        Ok(())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_document(&self) -> Option<&DocumentReference> {
        self.selected.and_then(|i| self.documents.get(i))
    }

    pub fn result_markdown(&self) -> &str {
        &self.result_markdown
    }

    pub fn set_result_markdown(&mut self, markdown: String) {
        self.result_markdown = markdown;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Whether the OCR trigger is enabled.
    pub fn can_submit(&self) -> bool {
        !self.busy && self.credential.is_some() && self.selected_document().is_some()
    }

    /// Presentation model of the document list.
    pub fn view(&self) -> DocumentListView {
        if self.documents.is_empty() {
            return DocumentListView::Empty;
        }
        DocumentListView::Listed {
            count: self.documents.len(),
            rows: self
                .documents
                .iter()
                .enumerate()
                .map(|(i, d)| DocumentRow {
                    index: i,
                    name: d.name.clone(),
                    url: d.url.clone(),
                    selected: self.selected == Some(i),
                })
                .collect(),
            submit_enabled: self.can_submit(),
        }
    }
}

/// What the selection list shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentListView {
    /// No PDF found; the OCR trigger is disabled.
    Empty,
    Listed {
        count: usize,
        rows: Vec<DocumentRow>,
        submit_enabled: bool,
    },
}

impl DocumentListView {
    /// Heading line above the list.
    pub fn summary(&self) -> String {
        match self {
            DocumentListView::Empty => "No PDF found".to_string(),
            DocumentListView::Listed { count, .. } => format!("{count} PDF(s) found"),
        }
    }
}

/// One selectable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRow {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub selected: bool,
}
