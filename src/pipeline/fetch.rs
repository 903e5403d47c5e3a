//! Page fetching with per-attempt timeout, fixed-delay retry, and a
//! politeness pause after every successful download.
//!
//! ## Outcome classification
//!
//! | Response                      | Result                          |
//! |-------------------------------|---------------------------------|
//! | 2xx, non-empty body           | `Data(bytes)` after politeness  |
//! | 2xx, empty body               | `Empty`, immediately, no retry  |
//! | non-2xx / error / timeout     | retry after `retry_delay`       |
//! | every attempt failed          | `Failure(ExhaustedRetries)`     |
//!
//! The delay between attempts is fixed, not exponential.

use crate::config::AcquisitionConfig;
use crate::error::{ExhaustedRetries, TransientFetchError};
use crate::pipeline::acquire::PageIndex;
use crate::pipeline::transport::PageTransport;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Timing and retry limits for one fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub politeness_delay: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            timeout: config.timeout(),
            politeness_delay: config.politeness_delay(),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&AcquisitionConfig::default())
    }
}

/// Classification of one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Data(Vec<u8>),
    Empty,
    Failure(ExhaustedRetries),
}

/// Fetches pages through a [`PageTransport`], applying [`FetchPolicy`].
pub struct PageFetcher {
    transport: Arc<dyn PageTransport>,
    policy: FetchPolicy,
    attempts: u64,
    bytes: u64,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn PageTransport>, policy: FetchPolicy) -> Self {
        Self {
            transport,
            policy,
            attempts: 0,
            bytes: 0,
        }
    }

    /// Requests issued so far, across all pages.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Body bytes of all `Data` outcomes so far.
    pub fn bytes_fetched(&self) -> u64 {
        self.bytes
    }

    /// Fetch one page, retrying transient failures.
    pub async fn fetch(&mut self, page: PageIndex) -> FetchOutcome {
        let max = self.policy.max_attempts.max(1);
        let mut last = TransientFetchError::Unknown("no attempt made".into());

        for attempt in 1..=max {
            self.attempts += 1;

            match self.attempt(page).await {
                Ok(body) if body.is_empty() => {
                    debug!("Page {}: empty response", page);
                    return FetchOutcome::Empty;
                }
                Ok(body) => {
                    debug!("Page {}: {} bytes on attempt {}", page, body.len(), attempt);
                    self.bytes += body.len() as u64;
                    if !self.policy.politeness_delay.is_zero() {
                        sleep(self.policy.politeness_delay).await;
                    }
                    return FetchOutcome::Data(body);
                }
                Err(e) => {
                    warn!("Page {}: attempt {}/{} failed: {}", page, attempt, max, e);
                    last = e;
                }
            }

            if attempt < max {
                sleep(self.policy.retry_delay).await;
            }
        }

        FetchOutcome::Failure(ExhaustedRetries {
            page,
            attempts: max,
            last,
        })
    }

    /// One bounded request. A non-success status counts as a failure.
    async fn attempt(&self, page: PageIndex) -> Result<Vec<u8>, TransientFetchError> {
        let response = timeout(self.policy.timeout, self.transport.get_page(page))
            .await
            .map_err(|_| TransientFetchError::Timeout {
                elapsed_ms: self.policy.timeout.as_millis() as u64,
            })??;

        if !response.is_success() {
            return Err(TransientFetchError::Status {
                status: response.status,
            });
        }
        Ok(response.body)
    }
}
