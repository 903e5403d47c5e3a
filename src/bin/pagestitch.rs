//! CLI binary for pagestitch.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AcquisitionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagestitch::pipeline::acquire::AcquisitionSummary;
use pagestitch::pipeline::validate::InvalidPayload;
use pagestitch::{
    download, write_pdf, AcquisitionConfig, AcquisitionProgressCallback, DocumentIdentity,
    ExhaustedRetries, PageIndex, PageSize, ProgressCallback, ThrottledProgress,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner whose message names the latest page.
///
/// The page count is unknown until the end, so this is a spinner rather
/// than a bar. Skips and failures are printed above it as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Fetching");
        bar.set_message("connecting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl AcquisitionProgressCallback for CliProgressCallback {
    fn on_acquisition_start(&self, document: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Downloading {document}…"))
        ));
    }

    fn on_page_acquired(&self, page: PageIndex) {
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_skipped(&self, page: PageIndex, reason: &InvalidPayload) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>4}  {}",
            cyan("⚠"),
            page,
            dim(&format!("skipped: {reason}"))
        ));
    }

    fn on_fetch_failed(&self, error: &ExhaustedRetries) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_acquisition_complete(&self, summary: &AcquisitionSummary) {
        self.bar.finish_and_clear();
        let mark = if summary.stop_reason.is_complete() {
            green("✔")
        } else {
            red("✘")
        };
        eprintln!(
            "{} {} pages acquired  {}",
            mark,
            bold(&summary.acquired.to_string()),
            dim(&format!(
                "({} skipped, {})",
                self.skipped.load(Ordering::SeqCst),
                summary.stop_reason
            )),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Download a document; the file name comes from --title or --name
  pagestitch --base-url https://viewer.example.org --id 48213 --name annual-report

  # Choose the output file and title
  pagestitch --base-url https://viewer.example.org --id 48213 --name annual-report \
      --title "Annual Report 2023" -o report.pdf

  # Slow server: longer timeout, more attempts per page
  pagestitch --timeout 60000 --max-retries 5 --retry-delay 2000 ...

  # JSON summary on stdout (PDF still written to disk)
  pagestitch --json ... > summary.json

ENVIRONMENT VARIABLES:
  PAGESTITCH_BASE_URL     Viewer base URL
  PAGESTITCH_OUTPUT       Output file path
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Download a document's page images from a remote viewer into one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pagestitch",
    version,
    about = "Download a document's page images from a remote viewer into one PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Viewer base URL (scheme and host, optionally a path prefix).
    #[arg(long, env = "PAGESTITCH_BASE_URL")]
    base_url: String,

    /// Document id as used by the viewer.
    #[arg(long)]
    id: String,

    /// Document name as used by the viewer.
    #[arg(long)]
    name: String,

    /// Human-readable title; used for the PDF metadata and file name.
    #[arg(long)]
    title: Option<String>,

    /// Write the PDF here instead of a name derived from the title.
    #[arg(short, long, env = "PAGESTITCH_OUTPUT")]
    output: Option<PathBuf>,

    /// Attempts per page before giving up (minimum 1).
    #[arg(long, env = "PAGESTITCH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Wait between attempts, in milliseconds.
    #[arg(long, env = "PAGESTITCH_RETRY_DELAY", default_value_t = 500)]
    retry_delay: u64,

    /// Per-attempt timeout, in milliseconds.
    #[arg(long, env = "PAGESTITCH_TIMEOUT", default_value_t = 30_000)]
    timeout: u64,

    /// Pause after each page that returned data, in milliseconds.
    #[arg(long, env = "PAGESTITCH_POLITENESS_DELAY", default_value_t = 100)]
    politeness_delay: u64,

    /// JPEG quality used by the size-reduction pass (1–100).
    #[arg(long, env = "PAGESTITCH_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Output page size.
    #[arg(long, env = "PAGESTITCH_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Rotate the output page size to landscape.
    #[arg(long)]
    landscape: bool,

    /// Print a JSON summary (DownloadOutput without the PDF bytes) on stdout.
    #[arg(long, env = "PAGESTITCH_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PAGESTITCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGESTITCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGESTITCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::LETTER,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the progress; library INFO lines would tear it.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        let throttled: ProgressCallback = Arc::new(ThrottledProgress::with_default_interval(cb));
        Some(throttled)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let mut identity = DocumentIdentity::new(cli.id.clone(), cli.name.clone());
    if let Some(ref title) = cli.title {
        identity = identity.with_title(title.clone());
    }

    // ── Run download ─────────────────────────────────────────────────────
    let output = download(&identity, &config)
        .await
        .context("Download failed")?;

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&output.filename));
    write_pdf(&output, &path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            if output.is_complete() {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.page_count(),
            output.stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
        eprintln!(
            "   {} fetched  /  {} written  {}",
            dim(&format!("{} bytes", output.stats.bytes_fetched)),
            dim(&format!("{} bytes", output.stats.pdf_bytes)),
            dim(&format!("({} requests)", output.stats.fetch_attempts)),
        );
        if !output.unrenderable.is_empty() {
            let pages: Vec<String> = output.unrenderable.iter().map(|p| p.to_string()).collect();
            eprintln!("   {} could not decode pages {}", cyan("⚠"), pages.join(", "));
        }
        if !output.is_complete() {
            eprintln!("   {} {}", red("stopped early:"), output.stop_reason);
        }
    }

    Ok(())
}

/// Map CLI args to `AcquisitionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AcquisitionConfig> {
    let mut page_size: PageSize = cli.page_size.clone().into();
    if cli.landscape {
        page_size = page_size.landscape();
    }

    let mut builder = AcquisitionConfig::builder()
        .base_url(cli.base_url.clone())
        .max_retries(cli.max_retries)
        .retry_delay_ms(cli.retry_delay)
        .timeout_ms(cli.timeout)
        .politeness_delay_ms(cli.politeness_delay)
        .jpeg_quality(cli.quality)
        .page_size(page_size);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pagestitch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "--base-url",
            "https://viewer.example.org",
            "--id",
            "7",
            "--name",
            "doc",
            "--max-retries",
            "5",
            "--timeout",
            "1000",
            "--page-size",
            "letter",
            "--landscape",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.page_size, PageSize::LETTER.landscape());
        assert_eq!(config.base_url.as_deref(), Some("https://viewer.example.org"));
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let result = Cli::try_parse_from([
            "pagestitch", "--base-url", "https://x.org", "--id", "1", "--name", "d",
            "--quality", "0",
        ]);
        assert!(result.is_err());
    }
}
