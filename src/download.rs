//! Top-level download entry points.
//!
//! [`download`] is the one most callers want: give it a document identity
//! and a config with a viewer base URL, get back a PDF. The other functions
//! are variations on where the bytes come from ([`download_with_transport`])
//! or where they go ([`download_to_file`], [`download_sync`]).

use crate::config::AcquisitionConfig;
use crate::error::PageGrabError;
use crate::output::{DownloadOutput, DownloadStats};
use crate::pipeline::acquire::AcquisitionLoop;
use crate::pipeline::assemble::DocumentAssembler;
use crate::pipeline::fetch::{FetchPolicy, PageFetcher};
use crate::pipeline::input::{DocumentIdentity, ViewerEndpoint};
use crate::pipeline::transport::{HttpTransport, PageTransport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Download every page of a document and assemble them into a PDF.
///
/// # Returns
/// `Ok(DownloadOutput)` whenever acquisition ran, including when it stopped
/// early because a page exhausted its retries (check
/// [`DownloadOutput::is_complete`]).
///
/// # Errors
/// Only setup failures, before any request is sent:
/// - missing or malformed document id / name
/// - missing or malformed viewer base URL
/// - HTTP client construction failure
pub async fn download(
    identity: &DocumentIdentity,
    config: &AcquisitionConfig,
) -> Result<DownloadOutput, PageGrabError> {
    identity.validate()?;
    let endpoint = ViewerEndpoint::from_config(config)?;
    let transport = HttpTransport::new(endpoint, identity.clone(), config)?;
    download_with_transport(identity, Arc::new(transport), config).await
}

/// Like [`download`], but pages come from the given transport.
///
/// This is the seam for tests and for hosts that need their own HTTP stack
/// (proxies, cookies, recorded fixtures).
pub async fn download_with_transport(
    identity: &DocumentIdentity,
    transport: Arc<dyn PageTransport>,
    config: &AcquisitionConfig,
) -> Result<DownloadOutput, PageGrabError> {
    identity.validate()?;

    let span = info_span!("download", id = %identity.id, name = %identity.name);
    run(identity, transport, config).instrument(span).await
}

async fn run(
    identity: &DocumentIdentity,
    transport: Arc<dyn PageTransport>,
    config: &AcquisitionConfig,
) -> Result<DownloadOutput, PageGrabError> {
    let total_start = Instant::now();
    info!("Starting download: {}", identity.label());

    if let Some(ref cb) = config.progress_callback {
        cb.on_acquisition_start(&identity.label());
    }

    // ── Step 1: Acquire pages ────────────────────────────────────────────
    let acquire_start = Instant::now();
    let fetcher = PageFetcher::new(transport, FetchPolicy::from_config(config));
    let acquired = AcquisitionLoop::new(fetcher, config.empty_threshold)
        .with_progress(config.progress_callback.clone())
        .run()
        .await;
    let acquire_duration_ms = acquire_start.elapsed().as_millis() as u64;

    // ── Step 2: Assemble ─────────────────────────────────────────────────
    let assemble_start = Instant::now();
    let pages_acquired = acquired.acquired.len();
    let assembled = DocumentAssembler::from_config(config)
        .with_title(identity.title.clone())
        .assemble_async(acquired.acquired)
        .await?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let stats = DownloadStats {
        pages_acquired,
        pages_rendered: assembled.page_count(),
        pages_skipped: acquired.skipped.len(),
        fetch_attempts: acquired.attempts,
        bytes_fetched: acquired.bytes_fetched,
        pdf_bytes: assembled.pdf.len() as u64,
        reduction: assembled.reduction,
        acquire_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Download complete: {}/{} pages rendered, {} bytes, {}ms total",
        stats.pages_rendered, stats.pages_acquired, stats.pdf_bytes, stats.total_duration_ms
    );

    Ok(DownloadOutput {
        pdf: assembled.pdf,
        filename: identity.output_filename(),
        pages: assembled.pages,
        skipped: acquired.skipped,
        unrenderable: assembled.unrenderable,
        stop_reason: acquired.stop_reason,
        stats,
    })
}

/// Download and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written PDF behind.
pub async fn download_to_file(
    identity: &DocumentIdentity,
    output_path: impl AsRef<Path>,
    config: &AcquisitionConfig,
) -> Result<DownloadOutput, PageGrabError> {
    let output = download(identity, config).await?;
    write_pdf(&output, output_path.as_ref()).await?;
    Ok(output)
}

/// Write `output.pdf` to `path` atomically.
pub async fn write_pdf(output: &DownloadOutput, path: &Path) -> Result<(), PageGrabError> {
    let write_err = |source: std::io::Error| PageGrabError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), output.pdf.len());
    Ok(())
}

/// Synchronous wrapper around [`download`].
///
/// Creates a temporary tokio runtime internally.
pub fn download_sync(
    identity: &DocumentIdentity,
    config: &AcquisitionConfig,
) -> Result<DownloadOutput, PageGrabError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PageGrabError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(download(identity, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_identity_fails_before_any_request() {
        let config = AcquisitionConfig::builder()
            .base_url("https://viewer.example.org")
            .build()
            .unwrap();
        let err = download(&DocumentIdentity::new("", "doc"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PageGrabError::InvalidIdentity { .. }));
    }

    #[tokio::test]
    async fn missing_base_url_is_a_setup_error() {
        let err = download(&DocumentIdentity::new("1", "doc"), &AcquisitionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PageGrabError::InvalidEndpoint { .. }));
    }

    #[test]
    fn sync_wrapper_reports_setup_errors() {
        let err = download_sync(&DocumentIdentity::new("1", "bad name"), &AcquisitionConfig::default())
            .unwrap_err();
        assert!(matches!(err, PageGrabError::InvalidIdentity { .. }));
    }
}
