//! End-of-document detection.
//!
//! The viewer never tells us how many pages a document has. An empty `200`
//! is the only hint, and a single one occasionally shows up mid-document,
//! so the document is considered finished only after `threshold` empty
//! responses in a row.

/// Empty responses in a row that end the document unless configured otherwise.
pub const DEFAULT_EMPTY_THRESHOLD: u32 = 3;

/// Counts consecutive empty responses.
#[derive(Debug, Clone)]
pub struct EndOfDocumentDetector {
    consecutive_empty: u32,
    threshold: u32,
}

impl Default for EndOfDocumentDetector {
    fn default() -> Self {
        Self::new(DEFAULT_EMPTY_THRESHOLD)
    }
}

impl EndOfDocumentDetector {
    /// A threshold of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_empty: 0,
            threshold: threshold.max(1),
        }
    }

    /// Any data, valid image or not, breaks the run.
    pub fn on_data(&mut self) {
        self.consecutive_empty = 0;
    }

    /// Record one empty response; `true` once the run reaches the threshold.
    pub fn on_empty(&mut self) -> bool {
        self.consecutive_empty += 1;
        self.consecutive_empty >= self.threshold
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
