//! Streaming acquisition API: observe pages as they arrive.
//!
//! Progress callbacks run on the acquisition task and must return quickly.
//! Hosts that want to do slow work per page (edit a chat message, write a
//! database row) should use [`acquire_stream`] instead: the loop runs on its
//! own Tokio task and pushes [`AcquisitionEvent`]s into an unbounded channel,
//! so a slow consumer never delays the next request.
//!
//! The last item of every stream is [`AcquisitionEvent::Finished`], carrying
//! the acquired pages; pass them to
//! [`crate::pipeline::assemble::DocumentAssembler`] to get the PDF.
//!
//! Dropping the stream cancels the acquisition: no further requests are
//! sent and the pages collected so far are discarded.

use crate::config::AcquisitionConfig;
use crate::error::{ExhaustedRetries, PageGrabError};
use crate::pipeline::acquire::{AcquisitionLoop, AcquisitionResult, AcquisitionSummary, PageIndex};
use crate::pipeline::fetch::{FetchPolicy, PageFetcher};
use crate::pipeline::input::{DocumentIdentity, ViewerEndpoint};
use crate::pipeline::transport::{HttpTransport, PageTransport};
use crate::pipeline::validate::InvalidPayload;
use crate::progress::{AcquisitionProgressCallback, ProgressCallback};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info_span, Instrument};

/// One observation from a running acquisition.
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    PageAcquired(PageIndex),
    PageSkipped {
        page: PageIndex,
        reason: InvalidPayload,
    },
    FetchFailed(ExhaustedRetries),
    /// Always the final event.
    Finished(Box<AcquisitionResult>),
}

/// A boxed stream of acquisition events.
pub type EventStream = Pin<Box<dyn Stream<Item = AcquisitionEvent> + Send>>;

/// Start acquiring `identity` over HTTP and stream its events.
///
/// # Returns
/// - `Ok(EventStream)`: events in page order, ending with `Finished`
/// - `Err(PageGrabError)`: setup error; nothing was requested
pub async fn acquire_stream(
    identity: &DocumentIdentity,
    config: &AcquisitionConfig,
) -> Result<EventStream, PageGrabError> {
    identity.validate()?;
    let endpoint = ViewerEndpoint::from_config(config)?;
    let transport = HttpTransport::new(endpoint, identity.clone(), config)?;
    acquire_stream_with_transport(identity, Arc::new(transport), config).await
}

/// Like [`acquire_stream`], but pages come from the given transport.
pub async fn acquire_stream_with_transport(
    identity: &DocumentIdentity,
    transport: Arc<dyn PageTransport>,
    config: &AcquisitionConfig,
) -> Result<EventStream, PageGrabError> {
    identity.validate()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder: ProgressCallback = Arc::new(ChannelForwarder {
        tx: tx.clone(),
        inner: config.progress_callback.clone(),
    });

    let fetcher = PageFetcher::new(transport, FetchPolicy::from_config(config));
    let acquisition =
        AcquisitionLoop::new(fetcher, config.empty_threshold).with_progress(Some(forwarder));

    if let Some(ref cb) = config.progress_callback {
        cb.on_acquisition_start(&identity.label());
    }

    let span = info_span!("acquire_stream", id = %identity.id, name = %identity.name);
    tokio::spawn(
        async move {
            // Dropping the stream cancels the acquisition, in-flight request included.
            tokio::select! {
                result = acquisition.run() => {
                    let _ = tx.send(AcquisitionEvent::Finished(Box::new(result)));
                }
                _ = tx.closed() => {
                    debug!("Event stream dropped, stopping acquisition");
                }
            }
        }
        .instrument(span),
    );

    Ok(Box::pin(UnboundedReceiverStream::new(rx)))
}

/// Pushes loop callbacks into the event channel, then to the user's callback.
struct ChannelForwarder {
    tx: UnboundedSender<AcquisitionEvent>,
    inner: Option<ProgressCallback>,
}

impl AcquisitionProgressCallback for ChannelForwarder {
    fn on_page_acquired(&self, page: PageIndex) {
        let _ = self.tx.send(AcquisitionEvent::PageAcquired(page));
        if let Some(ref cb) = self.inner {
            cb.on_page_acquired(page);
        }
    }

    fn on_page_skipped(&self, page: PageIndex, reason: &InvalidPayload) {
        let _ = self.tx.send(AcquisitionEvent::PageSkipped {
            page,
            reason: reason.clone(),
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_skipped(page, reason);
        }
    }

    fn on_fetch_failed(&self, error: &ExhaustedRetries) {
        let _ = self.tx.send(AcquisitionEvent::FetchFailed(error.clone()));
        if let Some(ref cb) = self.inner {
            cb.on_fetch_failed(error);
        }
    }

    fn on_acquisition_complete(&self, summary: &AcquisitionSummary) {
        if let Some(ref cb) = self.inner {
            cb.on_acquisition_complete(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientFetchError;
    use crate::pipeline::acquire::StopReason;
    use crate::pipeline::transport::PageResponse;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Replay(Mutex<VecDeque<Vec<u8>>>);

    #[async_trait]
    impl PageTransport for Replay {
        async fn get_page(&self, _page: PageIndex) -> Result<PageResponse, TransientFetchError> {
            Ok(PageResponse::ok(self.0.lock().unwrap().pop_front().unwrap_or_default()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn events_arrive_in_order_and_end_with_finished() {
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0];
        let transport = Arc::new(Replay(Mutex::new(
            vec![png.clone(), b"junk".to_vec(), png].into(),
        )));
        let config = AcquisitionConfig::default();
        let doc = DocumentIdentity::new("1", "doc");

        let events: Vec<AcquisitionEvent> = acquire_stream_with_transport(&doc, transport, &config)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], AcquisitionEvent::PageAcquired(p) if p.get() == 1));
        assert!(matches!(events[1], AcquisitionEvent::PageSkipped { page, .. } if page.get() == 2));
        assert!(matches!(events[2], AcquisitionEvent::PageAcquired(p) if p.get() == 3));
        match &events[3] {
            AcquisitionEvent::Finished(result) => {
                assert_eq!(result.stop_reason, StopReason::EndOfDocumentDetected);
                assert_eq!(result.acquired.len(), 2);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    /// Serves a valid PNG signature for every page, forever.
    #[derive(Default)]
    struct Endless(AtomicUsize);

    #[async_trait]
    impl PageTransport for Endless {
        async fn get_page(&self, _page: PageIndex) -> Result<PageResponse, TransientFetchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(PageResponse::ok(vec![0x89, 0x50, 0x4E, 0x47, 0]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_stops_requests() {
        let transport = Arc::new(Endless::default());
        let mut events = acquire_stream_with_transport(
            &DocumentIdentity::new("1", "doc"),
            transport.clone(),
            &AcquisitionConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(events.next().await, Some(AcquisitionEvent::PageAcquired(_))));
        drop(events);
        tokio::task::yield_now().await;
        let at_drop = transport.0.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let later = transport.0.load(Ordering::SeqCst);
        assert!(
            later <= at_drop + 1,
            "acquisition kept running after the stream was dropped: {at_drop} -> {later}"
        );
    }

    #[tokio::test]
    async fn invalid_identity_is_rejected_up_front() {
        let transport = Arc::new(Replay(Mutex::new(VecDeque::new())));
        let err = acquire_stream_with_transport(
            &DocumentIdentity::new("1", ""),
            transport,
            &AcquisitionConfig::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, PageGrabError::InvalidIdentity { .. }));
    }
}
