//! Configuration types for OCR submission and Markdown normalisation.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. The normalisation thresholds live in
//! [`NormalizeRules`] so they can be tuned and unit-tested on their own.

use crate::error::ScoutError;
use serde::{Deserialize, Serialize};

/// Default OCR endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Configuration for an OCR submission.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfscout::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .model("mistral-ocr-latest")
///     .fetch_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.fetch_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// OCR endpoint receiving the POST request.
    pub endpoint: String,

    /// OCR model named in the request body. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Ask the service to return page images inline. Default: true.
    pub include_image_base64: bool,

    /// Rewrite `![..](img-0.jpeg)` references to the inline image data the
    /// service returned for that page. Default: true.
    ///
    /// Without this the returned image ids point at files that do not exist
    /// anywhere the user can reach.
    pub embed_page_images: bool,

    /// Separator placed between pages. Default: [`PageSeparator::HorizontalRule`].
    pub page_separator: PageSeparator,

    /// Timeout for the best-effort local document fetch in seconds. Default: 120.
    pub fetch_timeout_secs: u64,

    /// Timeout for the OCR request in seconds. Default: none (transport default).
    pub api_timeout_secs: Option<u64>,

    /// How long a success status stays visible, in milliseconds. Default: 3000.
    pub status_clear_ms: u64,

    /// How long the "copied" status stays visible, in milliseconds. Default: 2000.
    pub copy_status_clear_ms: u64,

    /// Thresholds for the Markdown normaliser.
    pub rules: NormalizeRules,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            include_image_base64: true,
            embed_page_images: true,
            page_separator: PageSeparator::HorizontalRule,
            fetch_timeout_secs: 120,
            api_timeout_secs: None,
            status_clear_ms: 3000,
            copy_status_clear_ms: 2000,
            rules: NormalizeRules::default(),
        }
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn embed_page_images(mut self, v: bool) -> Self {
        self.config.embed_page_images = v;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.api_timeout_secs = secs.map(|s| s.max(1));
        self
    }

    pub fn status_clear_ms(mut self, ms: u64) -> Self {
        self.config.status_clear_ms = ms;
        self
    }

    pub fn copy_status_clear_ms(mut self, ms: u64) -> Self {
        self.config.copy_status_clear_ms = ms;
        self
    }

    pub fn rules(mut self, rules: NormalizeRules) -> Self {
        self.config.rules = rules;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, ScoutError> {
        let c = &self.config;
        match url::Url::parse(&c.endpoint) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => {
                return Err(ScoutError::InvalidConfig(format!(
                    "endpoint must be an absolute http(s) URL, got '{}'",
                    c.endpoint
                )))
            }
        }
        if c.model.trim().is_empty() {
            return Err(ScoutError::InvalidConfig("model must not be empty".into()));
        }
        c.rules.validate()?;
        Ok(self.config)
    }
}

// ── Normalisation thresholds ─────────────────────────────────────────────

/// Thresholds driving [`crate::pipeline::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRules {
    /// Shortest fragment (in characters) considered for repetition collapse. Default: 5.
    pub min_fragment_chars: usize,

    /// Total consecutive occurrences (first match included) that trigger a collapse. Default: 5.
    pub min_repeats: usize,

    /// Characters of the repeated fragment quoted in the annotation. Default: 20.
    pub preview_chars: usize,

    /// Consecutive known-formula artifacts that trigger a collapse. Default: 3.
    pub formula_min_run: usize,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            min_fragment_chars: 5,
            min_repeats: 5,
            preview_chars: 20,
            formula_min_run: 3,
        }
    }
}

impl NormalizeRules {
    fn validate(&self) -> Result<(), ScoutError> {
        if self.min_fragment_chars == 0 {
            return Err(ScoutError::InvalidConfig(
                "min_fragment_chars must be ≥ 1".into(),
            ));
        }
        if self.min_repeats < 2 {
            return Err(ScoutError::InvalidConfig("min_repeats must be ≥ 2".into()));
        }
        if self.formula_min_run < 2 {
            return Err(ScoutError::InvalidConfig(
                "formula_min_run must be ≥ 2".into(),
            ));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n".
    None,
    /// Horizontal rule: "\n\n---\n\n" (default)
    #[default]
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
