//! Input resolution: validate the document identity and build request URLs.
//!
//! Turning a human-supplied link into an `(id, name)` pair is the caller's
//! job. What arrives here is already that pair, plus an optional display
//! title. We validate both halves before any network traffic so a typo fails
//! fast with a [`PageGrabError::InvalidIdentity`] instead of three timed-out
//! retries against a URL that can never work.

use crate::config::AcquisitionConfig;
use crate::error::PageGrabError;
use crate::pipeline::acquire::PageIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use tracing::debug;

static IDENTITY_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._~-]+$").unwrap());
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N} _.\-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const MAX_FILENAME_CHARS: usize = 120;

/// Addressing information for one remote document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentIdentity {
    /// Opaque document identifier assigned by the viewer.
    pub id: String,
    /// Opaque document name (slug) assigned by the viewer.
    pub name: String,
    /// Human-readable title; only used for the output file name.
    pub title: Option<String>,
}

impl DocumentIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Reject identities that cannot address any page.
    pub fn validate(&self) -> Result<(), PageGrabError> {
        check_part("document id", &self.id)?;
        check_part("document name", &self.name)
    }

    /// File name for the assembled PDF.
    ///
    /// Uses the sanitised title when it has any usable characters left,
    /// otherwise the document name.
    pub fn output_filename(&self) -> String {
        let stem = self
            .title
            .as_deref()
            .map(sanitize_title)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.name.clone());
        format!("{stem}.pdf")
    }

    /// Short label for logs and progress messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.id, self.name)
    }
}

fn check_part(what: &str, value: &str) -> Result<(), PageGrabError> {
    if value.trim().is_empty() {
        return Err(PageGrabError::InvalidIdentity {
            reason: format!("{what} is empty"),
        });
    }
    if !IDENTITY_PART.is_match(value) {
        return Err(PageGrabError::InvalidIdentity {
            reason: format!("{what} {value:?} contains characters outside [A-Za-z0-9._~-]"),
        });
    }
    Ok(())
}

fn sanitize_title(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let trimmed = collapsed.trim().trim_start_matches('.');
    trimmed.chars().take(MAX_FILENAME_CHARS).collect::<String>().trim_end().to_string()
}

/// The remote viewer's page-image endpoint.
#[derive(Debug, Clone)]
pub struct ViewerEndpoint {
    page_base: Url,
    viewer_base: String,
    render_mode: String,
}

impl ViewerEndpoint {
    /// Parse `config.base_url` and combine it with the configured paths.
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, PageGrabError> {
        let raw = config
            .base_url
            .as_deref()
            .ok_or_else(|| PageGrabError::InvalidEndpoint {
                url: String::new(),
                reason: "no viewer base URL configured".into(),
            })?;

        let invalid = |reason: String| PageGrabError::InvalidEndpoint {
            url: raw.to_string(),
            reason,
        };

        let base = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(invalid("scheme must be http or https".into()));
        }
        if base.host_str().is_none() {
            return Err(invalid("URL has no host".into()));
        }

        let trimmed = base.as_str().trim_end_matches('/');
        let page_base = Url::parse(&format!("{trimmed}{}", config.page_path))
            .map_err(|e| invalid(format!("page path: {e}")))?;
        let viewer_base = format!("{trimmed}{}", config.viewer_path.trim_end_matches('/'));

        debug!("Page endpoint: {}", page_base);
        Ok(Self {
            page_base,
            viewer_base,
            render_mode: config.render_mode.clone(),
        })
    }

    /// URL for one page image of `doc`.
    pub fn page_url(&self, doc: &DocumentIdentity, page: PageIndex) -> Url {
        let mut url = self.page_base.clone();
        url.query_pairs_mut()
            .append_pair("id", &doc.id)
            .append_pair("name", &doc.name)
            .append_pair("page", &page.to_string())
            .append_pair("mode", &self.render_mode);
        url
    }

    /// The human-facing viewer page of `doc`, sent as `Referer`.
    pub fn referer(&self, doc: &DocumentIdentity) -> Result<Url, PageGrabError> {
        Url::parse(&format!("{}/{}/{}", self.viewer_base, doc.id, doc.name)).map_err(|e| {
            PageGrabError::InvalidEndpoint {
                url: self.viewer_base.clone(),
                reason: format!("referer: {e}"),
            }
        })
    }
}
