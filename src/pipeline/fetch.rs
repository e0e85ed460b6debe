//! Best-effort local fetch of the selected document.
//!
//! Sending the document bytes inline lets the OCR service read PDFs it
//! cannot reach itself (intranet hosts, cookie-gated downloads, local
//! files). When the fetch fails for any reason the caller falls back to
//! sending the URL, so every error here is a [`RecoverableError`].
//!
//! The bytes travel as a `data:<mime>;base64,<payload>` URL, the same shape a
//! browser produces from `FileReader::readAsDataURL`.

use crate::error::RecoverableError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Raw document bytes and their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FetchedDocument {
    /// Encode as a self-describing `data:` URL.
    pub fn to_data_url(&self) -> String {
        let b64 = STANDARD.encode(&self.bytes);
        debug!("Encoded document → {} bytes base64", b64.len());
        format!("data:{};base64,{}", self.mime, b64)
    }
}

/// What is sent as `document_url` in the OCR request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPayload {
    /// Fetched bytes as a `data:` URL.
    Inline(String),
    /// The original URL, for the service to fetch itself.
    Url(String),
}

impl DocumentPayload {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentPayload::Inline(s) | DocumentPayload::Url(s) => s,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            DocumentPayload::Inline(_) => PayloadKind::Inline,
            DocumentPayload::Url(_) => PayloadKind::Url,
        }
    }
}

/// Which payload variant was sent, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Inline,
    Url,
}

/// Fetch a document over HTTP(S), or read it from disk for `file://` URLs.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<FetchedDocument, RecoverableError> {
    let fail = |reason: String| RecoverableError::DocumentFetchFailed {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| fail(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        "file" => return read_local(&parsed).await.map_err(fail),
        other => return Err(fail(format!("unsupported scheme '{other}'"))),
    }

    info!("Downloading document: {}", url);
    let response = client
        .get(parsed)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                fail(format!("timed out after {}s", timeout.as_secs()))
            } else {
                fail(e.to_string())
            }
        })?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| guess_mime(url).to_string());

    let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
    debug!("Fetched {} bytes ({})", bytes.len(), mime);

    Ok(FetchedDocument {
        mime,
        bytes: bytes.to_vec(),
    })
}

async fn read_local(url: &Url) -> Result<FetchedDocument, String> {
    let path: PathBuf = url
        .to_file_path()
        .map_err(|_| format!("not a local path: {url}"))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(FetchedDocument {
        mime: guess_mime(url.path()).to_string(),
        bytes,
    })
}

/// `Content-Type` without parameters, lowercased.
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn guess_mime(path: &str) -> &'static str {
    if path.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        FALLBACK_MIME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn data_url_shape() {
        let doc = FetchedDocument {
            mime: "application/pdf".into(),
            bytes: b"%PDF-1.7".to_vec(),
        };
        assert_eq!(doc.to_data_url(), "data:application/pdf;base64,JVBERi0xLjc=");
    }

    #[test]
    fn media_type_strips_parameters() {
        assert_eq!(media_type("Application/PDF; charset=binary"), "application/pdf");
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(guess_mime("/a/B.PDF"), "application/pdf");
        assert_eq!(guess_mime("/a/b.bin"), FALLBACK_MIME);
    }

    #[test]
    fn payload_accessors() {
        let p = DocumentPayload::Url("https://x/a.pdf".into());
        assert_eq!(p.as_str(), "https://x/a.pdf");
        assert_eq!(p.kind(), PayloadKind::Url);
        assert_eq!(DocumentPayload::Inline("data:".into()).kind(), PayloadKind::Inline);
    }

    #[tokio::test]
    async fn reads_file_urls() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4 test").unwrap();
        let url = Url::from_file_path(tmp.path()).unwrap();

        let client = reqwest::Client::new();
        let doc = fetch_document(&client, url.as_str(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(doc.mime, "application/pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn missing_file_is_recoverable() {
        let client = reqwest::Client::new();
        let err = fetch_document(&client, "file:///definitely/not/here.pdf", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RecoverableError::DocumentFetchFailed { .. }));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_recoverable() {
        let client = reqwest::Client::new();
        let err = fetch_document(&client, "ftp://x/a.pdf", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[tokio::test]
    async fn http_error_status_is_recoverable() {
        let (base, server) =
            crate::test_server::serve_once("404 Not Found", "text/plain", b"gone").await;
        let url = format!("{base}/missing.pdf");

        let err = fetch_document(&crate::test_server::client(), &url, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            RecoverableError::DocumentFetchFailed { url: u, reason } => {
                assert_eq!(u, url);
                assert!(reason.contains("404"), "got: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(server.await.unwrap().starts_with("GET /missing.pdf HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn http_media_type_drops_parameters() {
        let (base, server) = crate::test_server::serve_once(
            "200 OK",
            "Application/PDF; charset=binary",
            b"%PDF-1.7",
        )
        .await;

        let doc = fetch_document(
            &crate::test_server::client(),
            &format!("{base}/download?id=7"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(doc.mime, "application/pdf");
        assert_eq!(doc.bytes, b"%PDF-1.7");
        server.await.unwrap();
    }
}
