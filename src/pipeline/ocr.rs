//! OCR submission: one POST to the OCR endpoint, then text extraction.
//!
//! The network sits behind [`OcrTransport`] so the flow can be driven by a
//! fake in tests. [`HttpOcrTransport`] is the real implementation.
//!
//! ## Flow
//!
//! 1. Check preconditions (API key and selection), before any I/O
//! 2. Fetch the document locally; on failure send its URL instead
//! 3. POST `{model, document: {type, document_url}, include_image_base64}`
//! 4. Map non-2xx replies to [`ScoutError::ApiError`]
//! 5. Extract Markdown from `pages[].markdown` or `content`
//! 6. Normalise
//!
//! Nothing is retried.

use crate::config::OcrConfig;
use crate::error::{api_error_message, RecoverableError, ScoutError};
use crate::pipeline::fetch::{self, DocumentPayload, FetchedDocument, PayloadKind};
use crate::pipeline::locate::DocumentReference;
use crate::pipeline::normalize::normalize_markdown;
use crate::session::{Credential, Session};
use crate::status::{Status, StatusSink};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shown when the reply has neither `pages` nor `content`.
pub const UNRECOGNIZED_RESPONSE: &str = "Error: unrecognized API response format.";

/// Shown when the extracted text is empty.
pub const EMPTY_RESPONSE: &str = "No content extracted (empty response).";

// ── Wire types ───────────────────────────────────────────────────────────────

/// OCR request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: DocumentSource,
    pub include_image_base64: bool,
}

/// The `document` object of an [`OcrRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub document_url: String,
}

impl OcrRequest {
    pub fn new(config: &OcrConfig, payload: &DocumentPayload) -> Self {
        Self {
            model: config.model.clone(),
            document: DocumentSource {
                kind: "document_url".to_string(),
                document_url: payload.as_str().to_string(),
            },
            include_image_base64: config.include_image_base64,
        }
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// Network access needed by [`submit`].
#[async_trait]
pub trait OcrTransport: Send + Sync {
    /// Best-effort fetch of the document bytes.
    async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, RecoverableError>;

    /// POST the request and return the parsed JSON body of a 2xx reply.
    async fn post_ocr(
        &self,
        credential: &Credential,
        request: &OcrRequest,
    ) -> Result<Value, ScoutError>;
}

/// [`OcrTransport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpOcrTransport {
    client: reqwest::Client,
    endpoint: String,
    fetch_timeout: Duration,
    api_timeout: Option<Duration>,
}

impl HttpOcrTransport {
    pub fn new(config: &OcrConfig) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pdfscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScoutError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &OcrConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            api_timeout: config.api_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl OcrTransport for HttpOcrTransport {
    async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, RecoverableError> {
        fetch::fetch_document(&self.client, url, self.fetch_timeout).await
    }

    async fn post_ocr(
        &self,
        credential: &Credential,
        request: &OcrRequest,
    ) -> Result<Value, ScoutError> {
        info!("POST {} (model {})", self.endpoint, request.model);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(request);
        if let Some(t) = self.api_timeout {
            builder = builder.timeout(t);
        }

        let response = builder.send().await.map_err(|e| ScoutError::Transport {
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ScoutError::Transport {
            reason: e.to_string(),
        })?;
        debug!("OCR reply: HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(ScoutError::ApiError {
                message: api_error_message(status.as_u16(), &body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ScoutError::Transport {
            reason: format!("invalid JSON in OCR reply: {e}"),
        })
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Markdown pulled out of an OCR reply, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub markdown: String,
    pub page_count: usize,
    /// False when the reply shape was not understood.
    pub recognized: bool,
}

/// Turn an OCR reply into raw Markdown.
///
/// `pages[].markdown` joined by the configured separator wins; a non-empty
/// `content` string comes second; anything else yields
/// [`UNRECOGNIZED_RESPONSE`]. Empty text becomes [`EMPTY_RESPONSE`].
pub fn extract_markdown(reply: &Value, config: &OcrConfig) -> ExtractedText {
    let (markdown, page_count, recognized) =
        if let Some(pages) = reply.get("pages").and_then(Value::as_array) {
            (join_pages(pages, config), pages.len(), true)
        } else if let Some(content) = reply
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
        {
            (content.to_string(), 1, true)
        } else {
            error!("Unexpected OCR response shape: {}", shape_summary(reply));
            (UNRECOGNIZED_RESPONSE.to_string(), 0, false)
        };

    let markdown = if markdown.is_empty() {
        EMPTY_RESPONSE.to_string()
    } else {
        markdown
    };

    ExtractedText {
        markdown,
        page_count,
        recognized,
    }
}

fn join_pages(pages: &[Value], config: &OcrConfig) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push_str(&config.page_separator.render(i + 1));
        }
        let text = page.get("markdown").and_then(Value::as_str).unwrap_or("");
        if config.embed_page_images {
            out.push_str(&embed_images(text, page));
        } else {
            out.push_str(text);
        }
    }
    out
}

/// Point `](img-0.jpeg)` references at the inline image data of the page.
fn embed_images(markdown: &str, page: &Value) -> String {
    let Some(images) = page.get("images").and_then(Value::as_array) else {
        return markdown.to_string();
    };

    let mut out = markdown.to_string();
    for image in images {
        let id = image.get("id").and_then(Value::as_str).unwrap_or("");
        let data = image
            .get("image_base64")
            .and_then(Value::as_str)
            .unwrap_or("");
        if id.is_empty() || data.is_empty() {
            continue;
        }
        let data_url = if data.starts_with("data:") {
            data.to_string()
        } else {
            format!("data:{};base64,{}", image_mime(id), data)
        };
        out = out.replace(&format!("]({id})"), &format!("]({data_url})"));
    }
    out
}

fn image_mime(id: &str) -> &'static str {
    let lower = id.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Top-level keys only; the body may carry megabytes of base64.
fn shape_summary(reply: &Value) -> String {
    match reply.as_object() {
        Some(map) => format!("object with keys {:?}", map.keys().collect::<Vec<_>>()),
        None => format!("non-object JSON ({})", json_kind(reply)),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Submission ───────────────────────────────────────────────────────────────

/// Result of one OCR submission.
#[derive(Debug, Clone, Serialize)]
pub struct OcrOutput {
    pub document: DocumentReference,
    /// Markdown as extracted from the reply.
    pub raw_markdown: String,
    /// Normalised Markdown, ready for display and export.
    pub markdown: String,
    pub payload_kind: PayloadKind,
    pub page_count: usize,
    pub recognized: bool,
    pub duration_ms: u64,
}

/// Submit the session's selected document for OCR.
///
/// # Errors
/// - [`ScoutError::MissingInput`] without an API key or a selection; no
///   network call is made in that case
/// - [`ScoutError::ApiError`] for non-2xx replies
/// - [`ScoutError::Transport`] when no reply arrives or it is not JSON
pub async fn submit(
    session: &Session,
    transport: &dyn OcrTransport,
    config: &OcrConfig,
    sink: &dyn StatusSink,
) -> Result<OcrOutput, ScoutError> {
    let credential = session
        .credential()
        .ok_or(ScoutError::MissingInput { what: "API key" })?;
    let document = session
        .selected_document()
        .ok_or(ScoutError::MissingInput {
            what: "document selection",
        })?
        .clone();

    let start = Instant::now();
    info!("Processing '{}' ({})", document.name, document.url);

    // ── Step 1: Local fetch, URL fallback ───────────────────────────────
    sink.show(&Status::in_progress("Downloading PDF..."));
    let payload = match transport.fetch_document(&document.url).await {
        Ok(fetched) => {
            sink.show(&Status::in_progress("Processing PDF with OCR..."));
            DocumentPayload::Inline(fetched.to_data_url())
        }
        Err(e) => {
            warn!("{}; sending the URL instead", e);
            sink.show(&Status::in_progress("Processing direct URL..."));
            DocumentPayload::Url(document.url.clone())
        }
    };

    // ── Step 2: OCR request ─────────────────────────────────────────────
    let request = OcrRequest::new(config, &payload);
    let reply = transport.post_ocr(credential, &request).await?;

    // ── Step 3: Extract and normalise ───────────────────────────────────
    let extracted = extract_markdown(&reply, config);
    let markdown = normalize_markdown(&extracted.markdown, &config.rules);
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "OCR finished: {} page(s), {} chars in {}ms",
        extracted.page_count,
        markdown.len(),
        duration_ms
    );

    Ok(OcrOutput {
        document,
        raw_markdown: extracted.markdown,
        markdown,
        payload_kind: payload.kind(),
        page_count: extracted.page_count,
        recognized: extracted.recognized,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pages_joined_with_rule() {
        let reply = json!({"pages": [{"markdown": "A"}, {"markdown": "B"}]});
        let out = extract_markdown(&reply, &OcrConfig::default());
        assert_eq!(out.markdown, "A\n\n---\n\nB");
        assert_eq!(out.page_count, 2);
        assert!(out.recognized);
    }

    #[test]
    fn content_field_used() {
        let out = extract_markdown(&json!({"content": "Z"}), &OcrConfig::default());
        assert_eq!(out.markdown, "Z");
    }

    #[test]
    fn pages_take_precedence_over_content() {
        let reply = json!({"pages": [{"markdown": "P"}], "content": "C"});
        assert_eq!(extract_markdown(&reply, &OcrConfig::default()).markdown, "P");
    }

    #[test]
    fn unknown_shape_yields_placeholder() {
        let out = extract_markdown(&json!({}), &OcrConfig::default());
        assert_eq!(out.markdown, UNRECOGNIZED_RESPONSE);
        assert!(!out.recognized);
        let out = extract_markdown(&json!({"pages": "nope"}), &OcrConfig::default());
        assert_eq!(out.markdown, UNRECOGNIZED_RESPONSE);
    }

    #[test]
    fn empty_text_yields_placeholder() {
        let out = extract_markdown(&json!({"pages": []}), &OcrConfig::default());
        assert_eq!(out.markdown, EMPTY_RESPONSE);
        assert!(out.recognized);
        let out = extract_markdown(&json!({"pages": [{"markdown": ""}]}), &OcrConfig::default());
        assert_eq!(out.markdown, EMPTY_RESPONSE);
    }

    #[test]
    fn missing_page_markdown_is_blank() {
        let reply = json!({"pages": [{"index": 0}, {"markdown": "B"}]});
        assert_eq!(
            extract_markdown(&reply, &OcrConfig::default()).markdown,
            "\n\n---\n\nB"
        );
    }

    #[test]
    fn page_images_embedded() {
        let reply = json!({"pages": [{
            "markdown": "See ![img-0.jpeg](img-0.jpeg) and ![x](other.png)",
            "images": [
                {"id": "img-0.jpeg", "image_base64": "data:image/jpeg;base64,AAAA"},
                {"id": "img-1.png", "image_base64": null}
            ]
        }]});
        let out = extract_markdown(&reply, &OcrConfig::default());
        assert_eq!(
            out.markdown,
            "See ![img-0.jpeg](data:image/jpeg;base64,AAAA) and ![x](other.png)"
        );
    }

    #[test]
    fn bare_base64_gets_data_prefix() {
        let reply = json!({"pages": [{
            "markdown": "![](img-3.png)",
            "images": [{"id": "img-3.png", "image_base64": "QUJD"}]
        }]});
        let out = extract_markdown(&reply, &OcrConfig::default());
        assert_eq!(out.markdown, "![](data:image/png;base64,QUJD)");
    }

    #[test]
    fn embedding_can_be_disabled() {
        let config = OcrConfig::builder().embed_page_images(false).build().unwrap();
        let reply = json!({"pages": [{
            "markdown": "![](img-0.jpeg)",
            "images": [{"id": "img-0.jpeg", "image_base64": "data:image/jpeg;base64,AA"}]
        }]});
        assert_eq!(extract_markdown(&reply, &config).markdown, "![](img-0.jpeg)");
    }

    #[test]
    fn request_body_shape() {
        let req = OcrRequest::new(
            &OcrConfig::default(),
            &DocumentPayload::Url("https://x/a.pdf".into()),
        );
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "mistral-ocr-latest",
                "document": {"type": "document_url", "document_url": "https://x/a.pdf"},
                "include_image_base64": true
            })
        );
    }

    #[test]
    fn image_mime_by_extension() {
        assert_eq!(image_mime("img-0.JPEG"), "image/jpeg");
        assert_eq!(image_mime("img-0.webp"), "image/webp");
        assert_eq!(image_mime("img-0"), "image/png");
    }

    fn http_transport(base: &str) -> HttpOcrTransport {
        let config = OcrConfig::builder()
            .endpoint(format!("{base}/v1/ocr"))
            .build()
            .unwrap();
        HttpOcrTransport::with_client(crate::test_server::client(), &config)
    }

    fn url_request() -> OcrRequest {
        OcrRequest::new(
            &OcrConfig::default(),
            &DocumentPayload::Url("https://x/a.pdf".into()),
        )
    }

    #[tokio::test]
    async fn post_sends_bearer_and_json_body() {
        let (base, server) = crate::test_server::serve_once(
            "200 OK",
            "application/json",
            br#"{"pages":[{"markdown":"Hi"}]}"#,
        )
        .await;
        let credential = Credential::new("sk-test").unwrap();

        let reply = http_transport(&base)
            .post_ocr(&credential, &url_request())
            .await
            .unwrap();
        assert_eq!(reply, json!({"pages": [{"markdown": "Hi"}]}));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/ocr HTTP/1.1\r\n"), "got: {request}");
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("authorization: bearer sk-test\r\n"));
        assert!(lower.contains("content-type: application/json\r\n"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["document"]["document_url"], "https://x/a.pdf");
        assert_eq!(body["model"], "mistral-ocr-latest");
    }

    #[tokio::test]
    async fn error_status_uses_service_message() {
        let (base, server) = crate::test_server::serve_once(
            "401 Unauthorized",
            "application/json",
            br#"{"message":"Unauthorized"}"#,
        )
        .await;
        let credential = Credential::new("sk-bad").unwrap();

        let err = http_transport(&base)
            .post_ocr(&credential, &url_request())
            .await
            .unwrap_err();
        match err {
            ScoutError::ApiError { message } => assert_eq!(message, "Unauthorized"),
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn non_json_success_is_transport_error() {
        let (base, server) =
            crate::test_server::serve_once("200 OK", "text/html", b"<html>gateway</html>").await;
        let credential = Credential::new("sk-test").unwrap();

        let err = http_transport(&base)
            .post_ocr(&credential, &url_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Transport { .. }));
        assert!(err.to_string().contains("invalid JSON"));
        server.await.unwrap();
    }
}
