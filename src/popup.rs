//! The popup context: session state plus its injected collaborators.
//!
//! Every user action is a method here. Failures are shown on the status
//! sink and returned to the caller; none leaves the session busy.

use crate::config::OcrConfig;
use crate::error::ScoutError;
use crate::output;
use crate::pipeline::locate::{locate_documents, TabHost};
use crate::pipeline::ocr::{self, OcrOutput, OcrTransport};
use crate::session::{Credential, DocumentListView, Session};
use crate::status::{extracted_message, SharedStatusSink, Status};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Popup<H: TabHost> {
    session: Session,
    config: OcrConfig,
    host: H,
    transport: Arc<dyn OcrTransport>,
    sink: SharedStatusSink,
}

impl<H: TabHost> Popup<H> {
    pub fn new(
        config: OcrConfig,
        host: H,
        transport: Arc<dyn OcrTransport>,
        sink: SharedStatusSink,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            session: Session::new(credential),
            config,
            host,
            transport,
            sink,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn view(&self) -> DocumentListView {
        self.session.view()
    }

    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.session.set_credential(credential);
    }

    /// Run one detection pass and replace the document list.
    ///
    /// Without an active tab the list is emptied and the error reported.
    /// A page that could not be inspected is reported only when nothing
    /// else was found.
    pub async fn detect(&mut self) -> Result<DocumentListView, ScoutError> {
        self.sink
            .show(&Status::in_progress("Detecting PDFs on the page..."));
        match locate_documents(&self.host).await {
            Ok(detection) => {
                match detection.blocking_error() {
                    Some(e) => self.sink.show(&Status::error(e.to_string())),
                    None => self.sink.clear(),
                }
                self.session.replace_documents(detection.documents);
                Ok(self.session.view())
            }
            Err(e) => {
                self.session.replace_documents(Vec::new());
                self.sink.show(&Status::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Select a detected document by 0-based index.
    pub fn select(&mut self, index: usize) -> Result<(), ScoutError> {
        self.session.select(index).inspect_err(|e| {
            self.sink.show(&Status::error(e.to_string()));
        })
    }

    /// OCR the selected document and keep the normalised result.
    ///
    /// The session reports busy while the request is in flight, which
    /// disables the submit trigger in [`Session::view`].
    pub async fn process(&mut self) -> Result<OcrOutput, ScoutError> {
        self.session.set_busy(true);
        let result = ocr::submit(
            &self.session,
            self.transport.as_ref(),
            &self.config,
            self.sink.as_ref(),
        )
        .await;
        self.session.set_busy(false);

        match result {
            Ok(out) => {
                self.session.set_result_markdown(out.markdown.clone());
                self.sink.show(&Status::success(
                    extracted_message(out.markdown.len()),
                    Duration::from_millis(self.config.status_clear_ms),
                ));
                Ok(out)
            }
            Err(e) => {
                warn!("OCR failed: {}", e);
                self.sink.show(&Status::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Copy the current result to the clipboard through `term`.
    pub fn copy<W: Write>(&self, term: &mut W) -> Result<(), ScoutError> {
        match output::copy_to_clipboard(self.session.result_markdown(), term) {
            Ok(()) => {
                self.sink.show(&Status::success(
                    "Copied to clipboard",
                    Duration::from_millis(self.config.copy_status_clear_ms),
                ));
                Ok(())
            }
            Err(e) => {
                self.sink.show(&Status::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Save the current result as `<document name>.md` inside `dir`.
    pub fn download(&self, dir: &Path) -> Result<PathBuf, ScoutError> {
        let name = self
            .session
            .selected_document()
            .map(|d| d.name.as_str())
            .unwrap_or("");
        match output::download_markdown(self.session.result_markdown(), name, dir) {
            Ok(path) => {
                info!("Downloaded {}", path.display());
                Ok(path)
            }
            Err(e) => {
                self.sink.show(&Status::error(e.to_string()));
                Err(e)
            }
        }
    }
}
