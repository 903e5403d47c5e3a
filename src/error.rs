//! Error types for the pagestitch library.
//!
//! Three layers of failure exist, and each has its own type:
//!
//! * [`PageGrabError`]: **Fatal**: the download cannot start or its result
//!   cannot be written (missing document identity, malformed endpoint, bad
//!   configuration). Returned as `Err(PageGrabError)` from the top-level
//!   `download*` functions.
//!
//! * [`ExhaustedRetries`]: **Session-ending but not fatal**: every attempt
//!   for one page failed. Acquisition stops, but the pages acquired so far
//!   are still assembled and returned inside [`crate::output::DownloadOutput`].
//!
//! * [`TransientFetchError`]: **Per attempt**: one request timed out, could
//!   not connect, or came back with a non-success status. Absorbed by the
//!   fetcher's retry loop; only the last one survives, inside
//!   [`ExhaustedRetries`].
//!
//! Invalid payloads (bytes that are not a recognised image) are not errors
//! at all: they become [`crate::pipeline::acquire::SkippedPage`] records.

use crate::pipeline::acquire::PageIndex;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagestitch library.
#[derive(Debug, Error)]
pub enum PageGrabError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// Document identifier or name is missing or malformed.
    #[error("Invalid document identity: {reason}")]
    InvalidIdentity { reason: String },

    /// The viewer base URL could not be parsed or is not HTTP(S).
    #[error("Invalid viewer endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed (TLS backend, bad header).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single fetch attempt.
///
/// Never returned to callers on its own; the fetcher retries and keeps the
/// most recent one as [`ExhaustedRetries::last`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TransientFetchError {
    /// The attempt did not complete within the per-attempt timeout.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// Headers arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Anything the transport could not classify.
    #[error("unknown fetch error: {0}")]
    Unknown(String),
}

/// Every attempt for one page failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("page {page}: all {attempts} attempts failed, last error: {last}")]
pub struct ExhaustedRetries {
    pub page: PageIndex,
    pub attempts: u32,
    pub last: TransientFetchError,
}
