//! [`TabHost`] over the web: the "active tab" is a URL given by the user.
//!
//! Page inspection downloads the page and runs the link query on its HTML.
//! Anything that is not an HTML page reachable over http(s) or `file://`
//! counts as a restricted page and yields a [`RecoverableError`].

use crate::error::{RecoverableError, ScoutError};
use crate::pipeline::locate::{scan_html, ActiveTab, DocumentReference, TabHost};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// A single fixed tab, inspected over HTTP or from disk.
#[derive(Debug, Clone)]
pub struct WebTabHost {
    tab: Option<ActiveTab>,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebTabHost {
    /// `url = None` models a window with no active tab.
    pub fn new(
        url: Option<String>,
        title: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pdfscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScoutError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, url, title, timeout))
    }

    pub fn with_client(
        client: reqwest::Client,
        url: Option<String>,
        title: Option<String>,
        timeout: Duration,
    ) -> Self {
        let tab = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .map(|url| ActiveTab { url, title });
        Self {
            tab,
            client,
            timeout,
        }
    }

    async fn fetch_html(&self, url: &Url) -> Result<String, String> {
        info!("Inspecting page: {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(format!("not an HTML page ({content_type})"));
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        debug!("Fetched {} bytes of HTML", body.len());
        Ok(body)
    }
}

#[async_trait]
impl TabHost for WebTabHost {
    async fn active_tab(&self) -> Option<ActiveTab> {
        self.tab.clone()
    }

    async fn inspect_page(
        &self,
        tab: &ActiveTab,
    ) -> Result<Vec<DocumentReference>, RecoverableError> {
        let unavailable = |reason: String| RecoverableError::ContentScriptUnavailable {
            url: tab.url.clone(),
            reason,
        };

        let page = Url::parse(&tab.url).map_err(|e| unavailable(e.to_string()))?;
        let html = match page.scheme() {
            "http" | "https" => self.fetch_html(&page).await.map_err(unavailable)?,
            "file" => read_local_html(&page).await.map_err(unavailable)?,
            other => return Err(unavailable(format!("restricted page ({other}:)"))),
        };

        Ok(scan_html(&html, &page))
    }
}

async fn read_local_html(url: &Url) -> Result<String, String> {
    if url.path().to_ascii_lowercase().ends_with(".pdf") {
        return Err("not an HTML page".to_string());
    }
    let path = url
        .to_file_path()
        .map_err(|_| format!("not a local path: {url}"))?;
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))
}
