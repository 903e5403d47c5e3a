//! # pagestitch
//!
//! Download the page images of a document from a remote viewer and stitch
//! them into a single PDF.
//!
//! ## Why this crate?
//!
//! Many online document viewers never hand out the original file. They serve
//! one rendered image per page, addressed by page number, and give no page
//! count. This crate walks those page numbers one by one, survives flaky
//! responses, works out on its own where the document ends, and writes what
//! it collected as an ordinary PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! identity (id, name)
//!  │
//!  ├─ 1. Input     validate identity, build page / referer URLs
//!  ├─ 2. Fetch     GET one page; per-attempt timeout, fixed-delay retry
//!  ├─ 3. Validate  PNG / JPEG signature check (bad pages are skipped)
//!  ├─ 4. Detect    3 empty responses in a row = end of document
//!  ├─ 5. Assemble  one image per PDF page, scaled to fit (spawn_blocking)
//!  ├─ 6. Reduce    JPEG re-encode pass + stream compression
//!  └─ 7. Output    PDF bytes + stop reason + per-run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagestitch::{download_to_file, AcquisitionConfig, DocumentIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AcquisitionConfig::builder()
//!         .base_url("https://viewer.example.org")
//!         .build()?;
//!     let doc = DocumentIdentity::new("48213", "annual-report").with_title("Annual Report");
//!     let output = download_to_file(&doc, "report.pdf", &config).await?;
//!     eprintln!("{} pages ({})", output.page_count(), output.stop_reason);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagestitch` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pagestitch = { version = "0.1", default-features = false }
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and spans but never installs a
//! subscriber; that is the host's job (the `pagestitch` binary installs
//! one driven by `RUST_LOG`).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AcquisitionConfig, AcquisitionConfigBuilder, PageSize};
pub use download::{download, download_sync, download_to_file, download_with_transport, write_pdf};
pub use error::{ExhaustedRetries, PageGrabError, TransientFetchError};
pub use output::{DownloadOutput, DownloadStats};
pub use pipeline::acquire::{AcquiredPage, PageIndex, SkippedPage, StopReason};
pub use pipeline::input::DocumentIdentity;
pub use pipeline::transport::{PageResponse, PageTransport};
pub use progress::{AcquisitionProgressCallback, NoopProgressCallback, ProgressCallback, ThrottledProgress};
pub use stream::{acquire_stream, acquire_stream_with_transport, AcquisitionEvent, EventStream};
