//! Progress-callback trait for per-page acquisition events.
//!
//! Inject an [`Arc<dyn AcquisitionProgressCallback>`] via
//! [`crate::config::AcquisitionConfigBuilder::progress_callback`] to receive
//! events as the acquisition loop walks the document.
//!
//! Callbacks run synchronously on the acquisition task, so they must return
//! quickly: forward the event to a channel, bump an atomic, or redraw a
//! progress bar. Anything slower belongs behind a queue (see
//! [`crate::stream::acquire_stream`], which does exactly that).
//!
//! # Example
//!
//! ```rust
//! use pagestitch::{AcquisitionProgressCallback, AcquisitionConfig, PageIndex};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     acquired: AtomicUsize,
//! }
//!
//! impl AcquisitionProgressCallback for CountingCallback {
//!     fn on_page_acquired(&self, page: PageIndex) {
//!         let n = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page} acquired ({n} so far)");
//!     }
//! }
//!
//! let config = AcquisitionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { acquired: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ExhaustedRetries;
use crate::pipeline::acquire::{AcquisitionSummary, PageIndex};
use crate::pipeline::validate::InvalidPayload;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Called by the acquisition loop as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Within one session every call happens on the same
/// task, in increasing page order.
pub trait AcquisitionProgressCallback: Send + Sync {
    /// Called once before the first page is requested.
    fn on_acquisition_start(&self, document: &str) {
        let _ = document;
    }

    /// Called exactly once per page that fetched and validated.
    fn on_page_acquired(&self, page: PageIndex) {
        let _ = page;
    }

    /// Called when a page returned bytes that are not a recognised image.
    fn on_page_skipped(&self, page: PageIndex, reason: &InvalidPayload) {
        let _ = (page, reason);
    }

    /// Called when a page exhausted its attempts; acquisition stops after this.
    fn on_fetch_failed(&self, error: &ExhaustedRetries) {
        let _ = error;
    }

    /// Called once when the loop has stopped, before assembly.
    fn on_acquisition_complete(&self, summary: &AcquisitionSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AcquisitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AcquisitionConfig`].
pub type ProgressCallback = Arc<dyn AcquisitionProgressCallback>;

/// Default interval between forwarded page updates in [`ThrottledProgress`].
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(5);

/// Rate-limited view over another callback, for hosts that redraw status
/// messages (chat edits, notifications) which must not fire on every page.
///
/// `on_page_acquired` is forwarded for the first page and then at most once
/// per `interval`. The latest suppressed page is held back and forwarded
/// just before completion, so the host always sees the final page.
/// Start, skip, failure, and completion events always pass through.
pub struct ThrottledProgress {
    inner: ProgressCallback,
    interval: Duration,
    state: Mutex<ThrottleState>,
}

#[derive(Default)]
struct ThrottleState {
    last_forwarded: Option<Instant>,
    held: Option<PageIndex>,
}

impl ThrottledProgress {
    pub fn new(inner: ProgressCallback, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub fn with_default_interval(inner: ProgressCallback) -> Self {
        Self::new(inner, DEFAULT_THROTTLE_INTERVAL)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record `page`; `true` when it should go through now.
    fn should_forward(&self, page: PageIndex) -> bool {
        let now = Instant::now();
        let mut state = self.state();
        match state.last_forwarded {
            Some(prev) if now.duration_since(prev) < self.interval => {
                state.held = Some(page);
                false
            }
            _ => {
                state.last_forwarded = Some(now);
                state.held = None;
                true
            }
        }
    }
}

impl AcquisitionProgressCallback for ThrottledProgress {
    fn on_acquisition_start(&self, document: &str) {
        self.inner.on_acquisition_start(document);
    }

    fn on_page_acquired(&self, page: PageIndex) {
        if self.should_forward(page) {
            self.inner.on_page_acquired(page);
        }
    }

    fn on_page_skipped(&self, page: PageIndex, reason: &InvalidPayload) {
        self.inner.on_page_skipped(page, reason);
    }

    fn on_fetch_failed(&self, error: &ExhaustedRetries) {
        self.inner.on_fetch_failed(error);
    }

    fn on_acquisition_complete(&self, summary: &AcquisitionSummary) {
        let held = self.state().held.take();
        if let Some(page) = held {
            self.inner.on_page_acquired(page);
        }
        self.inner.on_acquisition_complete(summary);
    }
}
