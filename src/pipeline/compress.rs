//! Size reduction: re-encode embedded page images as JPEG.
//!
//! Page scans from document viewers are usually large PNGs or high-quality
//! JPEGs. Re-encoding them at a fixed JPEG quality typically cuts the output
//! by an order of magnitude with no visible loss on text. An image is only
//! replaced when the JPEG is actually smaller, so already-tight images are
//! left alone. The pass never adds, removes, or reorders pages.

use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{Document, Object, Stream};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::debug;

/// What [`reduce_size`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionStats {
    /// Image XObjects found.
    pub images: usize,
    /// Images replaced by a smaller JPEG.
    pub reencoded: usize,
    /// Encoded image bytes before the pass.
    pub bytes_before: u64,
    /// Encoded image bytes after the pass.
    pub bytes_after: u64,
}

/// Re-encode every RGB image XObject in `doc` as JPEG at `quality` (1–100)
/// where that makes it smaller.
pub fn reduce_size(doc: &mut Document, quality: u8) -> ReductionStats {
    let quality = quality.clamp(1, 100);
    let mut stats = ReductionStats::default();

    for object in doc.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_image(stream) {
            continue;
        }

        stats.images += 1;
        let before = stream.content.len() as u64;
        stats.bytes_before += before;

        if let Some(jpeg) = decode_rgb(stream).and_then(|rgb| encode_jpeg(&rgb, quality)) {
            if (jpeg.len() as u64) < before {
                debug!("Image {} → {} bytes at q{}", before, jpeg.len(), quality);
                stream.dict.set("Filter", "DCTDecode");
                stream.dict.remove(b"DecodeParms");
                stream.set_content(jpeg);
                stats.reencoded += 1;
            }
        }

        stats.bytes_after += stream.content.len() as u64;
    }

    stats
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn name_of<'a>(stream: &'a Stream, key: &[u8]) -> Option<&'a [u8]> {
    stream.dict.get(key).and_then(Object::as_name).ok()
}

fn dimension(stream: &Stream, key: &[u8]) -> Option<u32> {
    let v = stream.dict.get(key).and_then(Object::as_i64).ok()?;
    u32::try_from(v).ok().filter(|&v| v > 0)
}

/// Decode the samples of an 8-bit RGB image stream, whatever its filter.
fn decode_rgb(stream: &Stream) -> Option<RgbImage> {
    match name_of(stream, b"Filter") {
        Some(b"DCTDecode") => {
            image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok()
                .map(|img| img.to_rgb8())
        }
        Some(b"FlateDecode") | None => {
            if name_of(stream, b"ColorSpace") != Some(b"DeviceRGB".as_slice()) {
                return None;
            }
            let bits = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok();
            if bits != Some(8) || stream.dict.has(b"DecodeParms") {
                return None;
            }
            let width = dimension(stream, b"Width")?;
            let height = dimension(stream, b"Height")?;

            let samples = if name_of(stream, b"Filter").is_some() {
                let mut out = Vec::new();
                ZlibDecoder::new(stream.content.as_slice())
                    .read_to_end(&mut out)
                    .ok()?;
                out
            } else {
                stream.content.clone()
            };
            RgbImage::from_raw(width, height, samples)
        }
        Some(_) => None,
    }
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(rgb)
        .ok()?;
    Some(out)
}
