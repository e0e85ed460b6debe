//! CLI binary for pdfscout.
//!
//! A thin shim over the library crate: flags become an `OcrConfig`, the
//! page URL becomes the active tab, and status updates are drawn on stderr.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use keyslot::KeySlot;
use pdfscout::{
    render_preview, write_markdown, Credential, DocumentListView, HttpOcrTransport,
    NoopStatusSink, OcrConfig, PageSeparator, Popup, SharedStatusSink, Status, StatusKind,
    StatusSink, WebTabHost,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Status sinks ─────────────────────────────────────────────────────────────

/// Spinner while in progress, a coloured tick or cross once settled.
struct SpinnerSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl StatusSink for SpinnerSink {
    fn show(&self, status: &Status) {
        match status.kind {
            StatusKind::InProgress => {
                if let Ok(mut slot) = self.bar.lock() {
                    slot.get_or_insert_with(Self::spinner)
                        .set_message(status.message.clone());
                }
            }
            StatusKind::Success => {
                self.finish();
                eprintln!("{} {}", green("✔"), bold(&status.message));
            }
            StatusKind::Error => {
                self.finish();
                eprintln!("{} {}", red("✘"), red(&status.message));
            }
        }
    }

    fn clear(&self) {
        self.finish();
    }
}

/// One plain line per status, for logs and dumb terminals.
struct LineSink;

impl StatusSink for LineSink {
    fn show(&self, status: &Status) {
        eprintln!("{}", status.display_line());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Detect PDFs on a page and OCR the first one (stdout)
  pdfscout https://example.org/papers.html

  # The page itself is a PDF
  pdfscout https://arxiv.org/pdf/1706.03762.pdf -o attention.md

  # List candidates only, then pick the third
  pdfscout --list https://example.org/papers.html
  pdfscout --select 3 https://example.org/papers.html --download-dir ./out

  # Store the API key once, then copy the result to the clipboard
  pdfscout --api-key sk-... --save-key
  pdfscout --copy https://example.org/report.pdf

  # Rendered preview next to the Markdown
  pdfscout https://example.org/report.pdf --html preview.html -o report.md

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral API key (overrides the stored key)
  PDFSCOUT_TAB            Page URL used when none is given
  PDFSCOUT_KEY_FILE       Location of the stored API key
  RUST_LOG                Log filter (overrides -v / -q)

SETUP:
  1. Store API key:   pdfscout --api-key sk-... --save-key
  2. Run:             pdfscout https://example.org/report.pdf

  The key is kept in the platform config directory
  (e.g. ~/.config/pdfscout/api-key), readable only by the current user.
"#;

/// Find PDFs on a web page and OCR one to Markdown with Mistral OCR.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscout",
    version,
    about = "Find PDFs on a web page and OCR one to Markdown with Mistral OCR",
    long_about = "Detect the PDFs a page is or links to (links, embeds, frames), send the \
selected one to the Mistral OCR API, and clean up the returned Markdown: runaway repetition \
loops and formula artifacts are collapsed and images become centred blocks.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page URL (http, https or file). The "active tab".
    #[arg(env = "PDFSCOUT_TAB")]
    url: Option<String>,

    /// Tab title, used as the document name when the URL is itself a PDF.
    #[arg(long, env = "PDFSCOUT_TITLE")]
    title: Option<String>,

    /// Document to process, 1-based, as numbered by --list.
    #[arg(long, env = "PDFSCOUT_SELECT",
          value_parser = clap::value_parser!(u32).range(1..))]
    select: Option<u32>,

    /// List detected PDFs and exit.
    #[arg(long, env = "PDFSCOUT_LIST")]
    list: bool,

    /// Mistral API key. Falls back to the stored key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Store --api-key for later runs.
    #[arg(long, env = "PDFSCOUT_SAVE_KEY", requires = "api_key")]
    save_key: bool,

    /// Delete the stored API key.
    #[arg(long, env = "PDFSCOUT_FORGET_KEY", conflicts_with = "save_key")]
    forget_key: bool,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PDFSCOUT_OUTPUT")]
    output: Option<PathBuf>,

    /// Save Markdown as <document name>.md in this directory.
    #[arg(long, env = "PDFSCOUT_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Copy the Markdown to the clipboard (OSC 52).
    #[arg(long, env = "PDFSCOUT_COPY")]
    copy: bool,

    /// Write the rendered HTML preview to this file.
    #[arg(long, env = "PDFSCOUT_HTML")]
    html: Option<PathBuf>,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "PDFSCOUT_JSON")]
    json: bool,

    /// Print the Markdown as returned by the API, before cleanup.
    #[arg(long, env = "PDFSCOUT_RAW")]
    raw: bool,

    /// OCR model ID.
    #[arg(long, env = "PDFSCOUT_MODEL", default_value = pdfscout::config::DEFAULT_MODEL)]
    model: String,

    /// OCR endpoint URL.
    #[arg(long, env = "PDFSCOUT_ENDPOINT", default_value = pdfscout::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Page separator: none, hr, comment, or custom string.
    #[arg(long, env = "PDFSCOUT_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Page and document download timeout in seconds.
    #[arg(long, env = "PDFSCOUT_FETCH_TIMEOUT", default_value_t = 120)]
    fetch_timeout: u64,

    /// OCR request timeout in seconds (default: none).
    #[arg(long, env = "PDFSCOUT_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Disable the spinner.
    #[arg(long, env = "PDFSCOUT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSCOUT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSCOUT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the user-facing feedback; library INFO logs
    // would only interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Credential slot ──────────────────────────────────────────────────
    let slot = KeySlot::default_location();

    if cli.forget_key {
        slot.clear().context("Failed to delete the stored API key")?;
        if !cli.quiet {
            eprintln!("{} Stored API key removed", green("✔"));
        }
        if cli.url.is_none() {
            return Ok(());
        }
    }

    if cli.save_key {
        let key = cli.api_key.as_deref().unwrap_or("");
        slot.store(key).context("Failed to store the API key")?;
        if !cli.quiet {
            eprintln!(
                "{} API key saved to {}",
                green("✔"),
                dim(&slot.path().display().to_string())
            );
        }
        if cli.url.is_none() {
            return Ok(());
        }
    }

    let credential = match cli.api_key.as_deref().and_then(Credential::new) {
        Some(c) => Some(c),
        None => slot
            .load()
            .context("Failed to read the stored API key")?
            .as_deref()
            .and_then(Credential::new),
    };

    // ── Build the popup ──────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let host = WebTabHost::new(
        cli.url.clone(),
        cli.title.clone(),
        Duration::from_secs(cli.fetch_timeout),
    )
    .context("Failed to set up the page client")?;
    let transport =
        Arc::new(HttpOcrTransport::new(&config).context("Failed to set up the OCR client")?);
    let sink: SharedStatusSink = if cli.quiet || cli.json {
        Arc::new(NoopStatusSink)
    } else if show_progress {
        SpinnerSink::new()
    } else {
        Arc::new(LineSink)
    };

    let mut popup = Popup::new(config, host, transport, sink, credential);

    // ── Detect ───────────────────────────────────────────────────────────
    let view = popup.detect().await.context("Detection failed")?;

    if cli.list {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&view).context("Failed to serialise document list")?
            );
        } else {
            print_list(&view, &mut io::stdout().lock()).context("Failed to write to stdout")?;
        }
        return Ok(());
    }

    if let DocumentListView::Empty = view {
        anyhow::bail!("No PDF found on {}", cli.url.as_deref().unwrap_or("the page"));
    }

    if let Some(n) = cli.select {
        popup
            .select(n as usize - 1)
            .context("Invalid --select value")?;
    }

    if !cli.quiet && !cli.json {
        print_list(&popup.view(), &mut io::stderr().lock())
            .context("Failed to write to stderr")?;
    }

    // ── Process ──────────────────────────────────────────────────────────
    let output = popup.process().await.context("OCR failed")?;
    let markdown = popup.session().result_markdown();

    // ── Outputs ──────────────────────────────────────────────────────────
    if let Some(ref dir) = cli.download_dir {
        let path = popup.download(dir).context("Download failed")?;
        if !cli.quiet {
            eprintln!("{} Saved {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if let Some(ref path) = cli.html {
        write_markdown(&render_preview(markdown), path)
            .with_context(|| format!("Failed to write preview to {}", path.display()))?;
    }

    if cli.copy {
        popup.copy(&mut io::stderr()).context("Copy failed")?;
    }

    let text = if cli.raw {
        output.raw_markdown.as_str()
    } else {
        markdown
    };

    if let Some(ref path) = cli.output {
        write_markdown(text, path).context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} page(s)  {}ms  →  {}",
                green("✔"),
                output.page_count,
                output.duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.download_dir.is_none() && !cli.copy {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json && !output.recognized {
        eprintln!(
            "{} {}",
            cyan("⚠"),
            dim("The OCR reply had an unexpected shape; see the output for details")
        );
    }

    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli) -> Result<OcrConfig> {
    OcrConfig::builder()
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .page_separator(parse_separator(&cli.separator))
        .fetch_timeout_secs(cli.fetch_timeout)
        .api_timeout_secs(cli.api_timeout)
        .build()
        .context("Invalid configuration")
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

/// Print the document list, marking the selected row.
fn print_list(view: &DocumentListView, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", bold(&view.summary()))?;
    if let DocumentListView::Listed { rows, .. } = view {
        for row in rows {
            let marker = if row.selected { cyan("(*)") } else { "( )".to_string() };
            writeln!(out, "  {marker} {:>2}. {}  {}", row.index + 1, row.name, dim(&row.url))?;
        }
    }
    Ok(())
}
