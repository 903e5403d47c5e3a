//! Result types returned by the download entry points.

use crate::pipeline::acquire::{PageIndex, SkippedPage, StopReason};
use crate::pipeline::compress::ReductionStats;
use serde::{Deserialize, Serialize};

/// A finished download: the PDF plus everything needed to judge it.
///
/// A download that stopped on [`StopReason::FetchFailed`] still carries a
/// PDF of the pages acquired before the failure; whether that is good
/// enough is the caller's call (see [`DownloadOutput::is_complete`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutput {
    /// Serialised PDF bytes.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Suggested file name, derived from the title or document name.
    pub filename: String,
    /// Source page numbers present in the PDF, in order.
    pub pages: Vec<PageIndex>,
    /// Pages that returned something other than an image.
    pub skipped: Vec<SkippedPage>,
    /// Pages with a valid signature that failed to decode.
    pub unrenderable: Vec<PageIndex>,
    pub stop_reason: StopReason,
    pub stats: DownloadStats,
}

impl DownloadOutput {
    /// `true` when the end of the document was reached.
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_complete()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Aggregate counters for one download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Pages that fetched and passed signature validation.
    pub pages_acquired: usize,
    /// Pages placed in the PDF; lower than `pages_acquired` when some
    /// acquired images would not decode.
    pub pages_rendered: usize,
    pub pages_skipped: usize,
    /// Requests sent, retries included.
    pub fetch_attempts: u64,
    /// Image bytes received from the viewer.
    pub bytes_fetched: u64,
    /// Size of the final PDF.
    pub pdf_bytes: u64,
    pub reduction: ReductionStats,
    pub acquire_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}
