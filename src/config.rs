//! Configuration types for page acquisition and PDF assembly.
//!
//! All download behaviour is controlled through [`AcquisitionConfig`], built
//! via its [`AcquisitionConfigBuilder`]. Every delay, limit, and quality knob
//! lives here rather than as a literal inside the pipeline, so two runs can
//! be compared by diffing their configs.

use crate::error::PageGrabError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Browser string sent with every page request unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for one document download.
///
/// Built via [`AcquisitionConfig::builder()`] or using
/// [`AcquisitionConfig::default()`].
///
/// # Example
/// ```rust
/// use pagestitch::AcquisitionConfig;
///
/// let config = AcquisitionConfig::builder()
///     .base_url("https://viewer.example.org")
///     .max_retries(3)
///     .retry_delay_ms(2000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AcquisitionConfig {
    /// Base URL of the remote document viewer, e.g. `https://viewer.example.org`.
    ///
    /// Parsed into a [`crate::pipeline::input::ViewerEndpoint`] when a
    /// download starts; a missing or malformed value is a setup error.
    pub base_url: Option<String>,

    /// Path of the page-image endpoint relative to `base_url`. Default: `/page`.
    pub page_path: String,

    /// Path prefix of the human-facing viewer page, used for the `Referer`
    /// header. Default: `/view`.
    pub viewer_path: String,

    /// Rendering-mode flag sent with every page request. Default: `image`.
    pub render_mode: String,

    /// `User-Agent` header value.
    pub user_agent: String,

    /// Attempts per page, counting the first. Default: 3.
    pub max_retries: u32,

    /// Pause between failed attempts for the same page, in milliseconds. Default: 500.
    ///
    /// Raise to 2000 when the remote viewer is slow or flaky.
    pub retry_delay_ms: u64,

    /// Upper bound on one attempt, in milliseconds. Default: 30000.
    pub timeout_ms: u64,

    /// Pause after every page that returned data, in milliseconds. Default: 100.
    pub politeness_delay_ms: u64,

    /// Consecutive empty responses that end the document. Default: 3.
    pub empty_threshold: u32,

    /// JPEG quality used by the size-reduction pass (1–100). Default: 75.
    pub jpeg_quality: u8,

    /// Output page geometry. Default: A4 portrait.
    pub page_size: PageSize,

    /// Observer for per-page progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            page_path: "/page".to_string(),
            viewer_path: "/view".to_string(),
            render_mode: "image".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            timeout_ms: 30_000,
            politeness_delay_ms: 100,
            empty_threshold: 3,
            jpeg_quality: 75,
            page_size: PageSize::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AcquisitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionConfig")
            .field("base_url", &self.base_url)
            .field("page_path", &self.page_path)
            .field("viewer_path", &self.viewer_path)
            .field("render_mode", &self.render_mode)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("politeness_delay_ms", &self.politeness_delay_ms)
            .field("empty_threshold", &self.empty_threshold)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("page_size", &self.page_size)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AcquisitionProgressCallback>"),
            )
            .finish()
    }
}

impl AcquisitionConfig {
    /// Create a new builder for `AcquisitionConfig`.
    pub fn builder() -> AcquisitionConfigBuilder {
        AcquisitionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

/// Builder for [`AcquisitionConfig`].
#[derive(Debug)]
pub struct AcquisitionConfigBuilder {
    config: AcquisitionConfig,
}

impl AcquisitionConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn page_path(mut self, path: impl Into<String>) -> Self {
        self.config.page_path = path.into();
        self
    }

    pub fn viewer_path(mut self, path: impl Into<String>) -> Self {
        self.config.viewer_path = path.into();
        self
    }

    pub fn render_mode(mut self, mode: impl Into<String>) -> Self {
        self.config.render_mode = mode.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn politeness_delay_ms(mut self, ms: u64) -> Self {
        self.config.politeness_delay_ms = ms;
        self
    }

    pub fn empty_threshold(mut self, n: u32) -> Self {
        self.config.empty_threshold = n.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AcquisitionConfig, PageGrabError> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(PageGrabError::InvalidConfig(
                "Timeout must be > 0 ms".into(),
            ));
        }
        if c.render_mode.trim().is_empty() {
            return Err(PageGrabError::InvalidConfig(
                "Render mode must not be empty".into(),
            ));
        }
        if !c.page_path.starts_with('/') {
            return Err(PageGrabError::InvalidConfig(format!(
                "Page path must start with '/', got {:?}",
                c.page_path
            )));
        }
        if !c.page_size.is_valid() {
            return Err(PageGrabError::InvalidConfig(format!(
                "Page size must be positive, got {}x{} pt",
                c.page_size.width_pt, c.page_size.height_pt
            )));
        }
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Output page dimensions in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width_pt: 595.28,
        height_pt: 841.89,
    };

    pub const LETTER: PageSize = PageSize {
        width_pt: 612.0,
        height_pt: 792.0,
    };

    /// Swap width and height.
    pub fn landscape(self) -> Self {
        Self {
            width_pt: self.height_pt,
            height_pt: self.width_pt,
        }
    }

    fn is_valid(&self) -> bool {
        self.width_pt.is_finite()
            && self.height_pt.is_finite()
            && self.width_pt > 0.0
            && self.height_pt > 0.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AcquisitionConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay_ms, 500);
        assert_eq!(c.timeout_ms, 30_000);
        assert_eq!(c.empty_threshold, 3);
        assert_eq!(c.jpeg_quality, 75);
        assert_eq!(c.page_size, PageSize::A4);
        assert!(c.base_url.is_none());
    }

    #[test]
    fn builder_clamps_limits() {
        let c = AcquisitionConfig::builder()
            .max_retries(0)
            .empty_threshold(0)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.empty_threshold, 1);
        assert_eq!(c.jpeg_quality, 1);

        let c = AcquisitionConfig::builder().jpeg_quality(250).build().unwrap();
        assert_eq!(c.jpeg_quality, 100);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = AcquisitionConfig::builder().timeout_ms(0).build().unwrap_err();
        assert!(matches!(err, PageGrabError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_relative_page_path() {
        let err = AcquisitionConfig::builder()
            .page_path("page")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn builder_rejects_degenerate_page_size() {
        let err = AcquisitionConfig::builder()
            .page_size(PageSize {
                width_pt: 0.0,
                height_pt: 100.0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, PageGrabError::InvalidConfig(_)));
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let l = PageSize::A4.landscape();
        assert_eq!(l.width_pt, PageSize::A4.height_pt);
        assert_eq!(l.height_pt, PageSize::A4.width_pt);
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let c = AcquisitionConfig::builder()
            .retry_delay_ms(2000)
            .timeout_ms(1500)
            .politeness_delay_ms(0)
            .build()
            .unwrap();
        assert_eq!(c.retry_delay(), Duration::from_millis(2000));
        assert_eq!(c.timeout(), Duration::from_millis(1500));
        assert_eq!(c.politeness_delay(), Duration::ZERO);
    }
}
