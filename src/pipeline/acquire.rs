//! The acquisition loop: walk page numbers forward until the document ends.
//!
//! ## State machine
//!
//! ```text
//!            ┌──────────── Data (valid or not): advance page ────┐
//!            ▼                                                    │
//!  ──▶  Running ── Empty (below threshold): same page again ──▶ Running
//!            │
//!            ├── Empty (threshold reached) ──▶ Stopped(EndOfDocumentDetected)
//!            └── Failure ───────────────────▶ Stopped(FetchFailed)
//! ```
//!
//! An empty response does not advance the page number: the same page is
//! requested again, and only `threshold` empties in a row end the document.
//! Both stop reasons are normal completions; whatever was acquired is handed
//! to the assembler either way.

use crate::error::ExhaustedRetries;
use crate::pipeline::detect::EndOfDocumentDetector;
use crate::pipeline::fetch::{FetchOutcome, PageFetcher};
use crate::pipeline::validate::{validate, ImageFormat, InvalidPayload, ValidationVerdict};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// 1-based position of a page in the remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(usize);

impl PageIndex {
    pub const FIRST: PageIndex = PageIndex(1);

    /// Page numbers start at 1; `0` is lifted to 1.
    pub fn new(n: usize) -> Self {
        Self(n.max(1))
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A page that fetched and passed signature validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredPage {
    pub page: PageIndex,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// A page that returned bytes which are not a recognised image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPage {
    pub page: PageIndex,
    pub reason: InvalidPayload,
}

/// Why acquisition stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndOfDocumentDetected,
    FetchFailed(ExhaustedRetries),
}

impl StopReason {
    pub fn is_complete(&self) -> bool {
        matches!(self, StopReason::EndOfDocumentDetected)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfDocumentDetected => f.write_str("end of document detected"),
            StopReason::FetchFailed(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

/// Counts reported to progress observers when the loop stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub stop_reason: StopReason,
    pub acquired: usize,
    pub skipped: usize,
    /// Page number the loop was on when it stopped.
    pub last_page: PageIndex,
}

/// Mutable state of one document download.
///
/// Owned by a single [`AcquisitionLoop`]; concurrent downloads each get
/// their own.
#[derive(Debug, Clone)]
pub struct AcquisitionSession {
    current: PageIndex,
    detector: EndOfDocumentDetector,
    acquired: Vec<AcquiredPage>,
    skipped: Vec<SkippedPage>,
}

impl AcquisitionSession {
    pub fn new(empty_threshold: u32) -> Self {
        Self {
            current: PageIndex::FIRST,
            detector: EndOfDocumentDetector::new(empty_threshold),
            acquired: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn current_page(&self) -> PageIndex {
        self.current
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.detector.consecutive_empty()
    }

    pub fn acquired(&self) -> &[AcquiredPage] {
        &self.acquired
    }

    pub fn skipped(&self) -> &[SkippedPage] {
        &self.skipped
    }
}

/// Everything the loop produced, ready for assembly.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    /// Valid pages in document order.
    pub acquired: Vec<AcquiredPage>,
    pub skipped: Vec<SkippedPage>,
    pub stop_reason: StopReason,
    pub last_page: PageIndex,
    /// Requests issued, retries included.
    pub attempts: u64,
    pub bytes_fetched: u64,
}

impl AcquisitionResult {
    pub fn summary(&self) -> AcquisitionSummary {
        AcquisitionSummary {
            stop_reason: self.stop_reason.clone(),
            acquired: self.acquired.len(),
            skipped: self.skipped.len(),
            last_page: self.last_page,
        }
    }
}

/// Drives a [`PageFetcher`] over one document.
pub struct AcquisitionLoop {
    fetcher: PageFetcher,
    session: AcquisitionSession,
    progress: Option<ProgressCallback>,
}

impl AcquisitionLoop {
    pub fn new(fetcher: PageFetcher, empty_threshold: u32) -> Self {
        Self {
            fetcher,
            session: AcquisitionSession::new(empty_threshold),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn session(&self) -> &AcquisitionSession {
        &self.session
    }

    /// Process one fetch. Returns the stop reason once the loop must end.
    pub async fn step(&mut self) -> Option<StopReason> {
        let page = self.session.current;

        match self.fetcher.fetch(page).await {
            FetchOutcome::Failure(e) => {
                warn!("Stopping at page {}: {}", page, e);
                if let Some(ref cb) = self.progress {
                    cb.on_fetch_failed(&e);
                }
                Some(StopReason::FetchFailed(e))
            }
            FetchOutcome::Empty => {
                if self.session.detector.on_empty() {
                    info!(
                        "Page {}: {} consecutive empty responses, end of document",
                        page,
                        self.session.detector.consecutive_empty()
                    );
                    Some(StopReason::EndOfDocumentDetected)
                } else {
                    debug!(
                        "Page {}: empty ({}/{}), probing again",
                        page,
                        self.session.detector.consecutive_empty(),
                        self.session.detector.threshold()
                    );
                    None
                }
            }
            FetchOutcome::Data(bytes) => {
                self.session.detector.on_data();
                match validate(&bytes) {
                    ValidationVerdict::Valid(format) => {
                        debug!("Page {}: {} ({} bytes)", page, format, bytes.len());
                        self.session.acquired.push(AcquiredPage {
                            page,
                            format,
                            bytes,
                        });
                        if let Some(ref cb) = self.progress {
                            cb.on_page_acquired(page);
                        }
                    }
                    ValidationVerdict::Invalid(reason) => {
                        warn!("Page {}: skipped, {}", page, reason);
                        if let Some(ref cb) = self.progress {
                            cb.on_page_skipped(page, &reason);
                        }
                        self.session.skipped.push(SkippedPage { page, reason });
                    }
                }
                self.session.current = page.next();
                None
            }
        }
    }

    /// Run until a stop condition, then hand over the collected pages.
    pub async fn run(mut self) -> AcquisitionResult {
        let stop_reason = loop {
            if let Some(reason) = self.step().await {
                break reason;
            }
        };

        let result = AcquisitionResult {
            acquired: self.session.acquired,
            skipped: self.session.skipped,
            stop_reason,
            last_page: self.session.current,
            attempts: self.fetcher.attempts(),
            bytes_fetched: self.fetcher.bytes_fetched(),
        };

        info!(
            "Acquisition stopped ({}): {} pages acquired, {} skipped, {} requests",
            result.stop_reason,
            result.acquired.len(),
            result.skipped.len(),
            result.attempts
        );
        if let Some(ref cb) = self.progress {
            cb.on_acquisition_complete(&result.summary());
        }
        result
    }
}
