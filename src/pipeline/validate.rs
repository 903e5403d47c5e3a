//! Signature check for fetched page bytes.
//!
//! The viewer sometimes answers `200 OK` with an HTML error page or a
//! truncated body. Looking at the leading magic bytes is enough to keep
//! those out of the assembler; full decoding happens later, once, in
//! [`crate::pipeline::assemble`].

use serde::{Deserialize, Serialize};
use std::fmt;

const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];
const MIN_LEN: usize = 4;

/// Raster formats the assembler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => f.write_str("PNG"),
            ImageFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidPayload {
    /// Fewer than four bytes.
    TooShort { len: usize },
    /// Leading bytes match no known signature.
    UnknownSignature { leading: [u8; 4] },
}

impl fmt::Display for InvalidPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidPayload::TooShort { len } => write!(f, "payload too short ({len} bytes)"),
            InvalidPayload::UnknownSignature { leading } => {
                write!(f, "unrecognised signature {:02X?}", leading)
            }
        }
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationVerdict {
    Valid(ImageFormat),
    Invalid(InvalidPayload),
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationVerdict::Valid(_))
    }
}

/// Classify `bytes` by their leading signature.
pub fn validate(bytes: &[u8]) -> ValidationVerdict {
    if bytes.len() < MIN_LEN {
        return ValidationVerdict::Invalid(InvalidPayload::TooShort { len: bytes.len() });
    }
    if bytes.starts_with(&PNG_SIGNATURE) {
        return ValidationVerdict::Valid(ImageFormat::Png);
    }
    if bytes.starts_with(&JPEG_SIGNATURE) {
        return ValidationVerdict::Valid(ImageFormat::Jpeg);
    }
    let mut leading = [0u8; 4];
    leading.copy_from_slice(&bytes[..MIN_LEN]);
    ValidationVerdict::Invalid(InvalidPayload::UnknownSignature { leading })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffers_are_invalid() {
        for len in 0..MIN_LEN {
            let buf = vec![0x89; len];
            assert_eq!(
                validate(&buf),
                ValidationVerdict::Invalid(InvalidPayload::TooShort { len })
            );
        }
        // A bare JPEG marker is still too short.
        assert!(!validate(&[0xFF, 0xD8, 0xFF]).is_valid());
    }

    #[test]
    fn png_signature() {
        let buf = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(validate(&buf), ValidationVerdict::Valid(ImageFormat::Png));
        assert_eq!(validate(&buf[..4]), ValidationVerdict::Valid(ImageFormat::Png));
    }

    #[test]
    fn jpeg_signature() {
        let buf = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(validate(&buf), ValidationVerdict::Valid(ImageFormat::Jpeg));
    }

    #[test]
    fn html_error_page_is_invalid() {
        let verdict = validate(b"<!DOCTYPE html><html>oops</html>");
        assert_eq!(
            verdict,
            ValidationVerdict::Invalid(InvalidPayload::UnknownSignature {
                leading: *b"<!DO"
            })
        );
    }

    #[test]
    fn partial_png_signature_is_invalid() {
        assert!(!validate(&[0x89, 0x50, 0x4E, 0x00, 0x00]).is_valid());
    }

    #[test]
    fn verdict_is_stable_across_calls() {
        let inputs: [&[u8]; 4] = [
            &[0x89, 0x50, 0x4E, 0x47, 1],
            &[0xFF, 0xD8, 0, 0],
            b"GIF89a",
            &[1, 2],
        ];
        for bytes in inputs {
            assert_eq!(validate(bytes), validate(bytes));
        }
    }
}
