//! PDF assembly: one acquired image per page, scaled to fit and centred.
//!
//! Pages are decoded with `image`, stored losslessly (Flate-compressed RGB)
//! while the document is composed, and then handed to
//! [`crate::pipeline::compress::reduce_size`], which re-encodes them as JPEG
//! at the configured quality. Composing first and shrinking second keeps
//! placement logic independent of the output encoding.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and re-encoding a few hundred page scans is CPU-bound work that
//! would stall a Tokio worker; [`DocumentAssembler::assemble_async`] moves it
//! onto the blocking pool.

use crate::config::{AcquisitionConfig, PageSize};
use crate::error::PageGrabError;
use crate::pipeline::acquire::{AcquiredPage, PageIndex};
use crate::pipeline::compress::{reduce_size, ReductionStats};
use crate::pipeline::validate::ImageFormat;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::{debug, info, warn};

/// Position and size of an image on a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale `width × height` pixels to fit `page`, preserving aspect ratio, centred.
pub fn fit_centered(width: u32, height: u32, page: PageSize) -> Placement {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (page.width_pt / w).min(page.height_pt / h);
    let (width, height) = (w * scale, h * scale);
    Placement {
        x: (page.width_pt - width) / 2.0,
        y: (page.height_pt - height) / 2.0,
        width,
        height,
    }
}

/// The finished artifact.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    /// Serialised PDF bytes.
    pub pdf: Vec<u8>,
    /// Source page numbers, one per output page, in order.
    pub pages: Vec<PageIndex>,
    /// Pages whose bytes had a valid signature but would not decode.
    pub unrenderable: Vec<PageIndex>,
    pub reduction: ReductionStats,
}

impl AssembledDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Composes acquired pages into a PDF.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    page_size: PageSize,
    jpeg_quality: u8,
    title: Option<String>,
}

impl DocumentAssembler {
    pub fn new(page_size: PageSize, jpeg_quality: u8) -> Self {
        Self {
            page_size,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            title: None,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(config.page_size, config.jpeg_quality)
    }

    /// Title recorded in the PDF's document information dictionary.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Compose, shrink, and serialise. An empty `pages` yields a valid
    /// zero-page PDF.
    pub fn assemble(&self, pages: &[AcquiredPage]) -> Result<AssembledDocument, PageGrabError> {
        let mut composed = self.compose(pages)?;
        let reduction = reduce_size(&mut composed.document, self.jpeg_quality);
        composed.document.compress();

        let mut pdf = Vec::new();
        composed
            .document
            .save_to(&mut pdf)
            .map_err(|e| PageGrabError::Internal(format!("PDF serialisation failed: {e}")))?;

        info!(
            "Assembled {} pages into {} bytes ({} images re-encoded)",
            composed.pages.len(),
            pdf.len(),
            reduction.reencoded
        );

        Ok(AssembledDocument {
            pdf,
            pages: composed.pages,
            unrenderable: composed.unrenderable,
            reduction,
        })
    }

    /// [`assemble`](Self::assemble) on the blocking thread pool.
    pub async fn assemble_async(
        &self,
        pages: Vec<AcquiredPage>,
    ) -> Result<AssembledDocument, PageGrabError> {
        let assembler = self.clone();
        tokio::task::spawn_blocking(move || assembler.assemble(&pages))
            .await
            .map_err(|e| PageGrabError::Internal(format!("Assembly task panicked: {}", e)))?
    }

    /// Build the uncompressed document tree.
    pub fn compose(&self, pages: &[AcquiredPage]) -> Result<ComposedDocument, PageGrabError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        let mut placed = Vec::with_capacity(pages.len());
        let mut unrenderable = Vec::new();

        for acquired in pages {
            let rgb = match decode_rgb(acquired) {
                Ok(rgb) => rgb,
                Err(e) => {
                    warn!("Page {}: cannot decode {} ({})", acquired.page, acquired.format, e);
                    unrenderable.push(acquired.page);
                    continue;
                }
            };

            let page_id = self.add_page(&mut doc, pages_id, &rgb)?;
            debug!(
                "Page {} → {}x{} px image on output page {}",
                acquired.page,
                rgb.width(),
                rgb.height(),
                kids.len() + 1
            );
            kids.push(page_id.into());
            placed.push(acquired.page);
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal("pagestitch"),
        };
        if let Some(ref title) = self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);

        Ok(ComposedDocument {
            document: doc,
            pages: placed,
            unrenderable,
        })
    }

    fn add_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        rgb: &RgbImage,
    ) -> Result<ObjectId, PageGrabError> {
        let image_id = doc.add_object(rgb_image_stream(rgb)?);
        let p = fit_centered(rgb.width(), rgb.height(), self.page_size);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        p.width.into(),
                        0.into(),
                        0.into(),
                        p.height.into(),
                        p.x.into(),
                        p.y.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| PageGrabError::Internal(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.page_size.width_pt.into(),
                self.page_size.height_pt.into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        }))
    }
}

/// A composed but not yet size-reduced document.
pub struct ComposedDocument {
    pub document: Document,
    pub pages: Vec<PageIndex>,
    pub unrenderable: Vec<PageIndex>,
}

fn decode_rgb(page: &AcquiredPage) -> Result<RgbImage, image::ImageError> {
    let format = match page.format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };
    Ok(image::load_from_memory_with_format(&page.bytes, format)?.to_rgb8())
}

/// Lossless image XObject: 8-bit RGB samples, Flate-compressed.
fn rgb_image_stream(rgb: &RgbImage) -> Result<Stream, PageGrabError> {
    let stream_err = |e: std::io::Error| PageGrabError::Internal(format!("image stream: {e}"));

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw()).map_err(stream_err)?;
    let data = encoder.finish().map_err(stream_err)?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => rgb.width() as i64,
            "Height" => rgb.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 30, 30]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([10, 120, 240]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn page(n: usize, format: ImageFormat, bytes: Vec<u8>) -> AcquiredPage {
        AcquiredPage {
            page: PageIndex::new(n),
            format,
            bytes,
        }
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    #[test]
    fn fit_wide_image_is_vertically_centred() {
        let p = fit_centered(200, 100, PageSize { width_pt: 100.0, height_pt: 200.0 });
        assert_eq!(p.width, 100.0);
        assert_eq!(p.height, 50.0);
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 75.0);
    }

    #[test]
    fn fit_tall_image_is_horizontally_centred_and_upscaled() {
        let p = fit_centered(10, 40, PageSize { width_pt: 100.0, height_pt: 200.0 });
        assert_eq!(p.height, 200.0);
        assert_eq!(p.width, 50.0);
        assert_eq!(p.x, 25.0);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn empty_sequence_gives_valid_zero_page_pdf() {
        let doc = DocumentAssembler::new(PageSize::A4, 75).assemble(&[]).unwrap();
        assert!(doc.pdf.starts_with(b"%PDF-"));
        assert_eq!(doc.page_count(), 0);
        assert_eq!(page_count(&doc.pdf), 0);
    }

    #[test]
    fn one_output_page_per_image_in_order() {
        let pages = vec![
            page(1, ImageFormat::Png, png(40, 60)),
            page(2, ImageFormat::Jpeg, jpeg(64, 32)),
            page(4, ImageFormat::Png, png(10, 10)),
        ];
        let doc = DocumentAssembler::new(PageSize::A4, 75)
            .with_title(Some("Test".into()))
            .assemble(&pages)
            .unwrap();

        assert_eq!(
            doc.pages,
            vec![PageIndex::new(1), PageIndex::new(2), PageIndex::new(4)]
        );
        assert_eq!(page_count(&doc.pdf), 3);
        assert!(doc.unrenderable.is_empty());
    }

    #[test]
    fn undecodable_page_is_left_out() {
        let mut truncated = png(30, 30);
        truncated.truncate(20);
        let pages = vec![
            page(1, ImageFormat::Png, truncated),
            page(2, ImageFormat::Png, png(30, 30)),
        ];
        let doc = DocumentAssembler::new(PageSize::A4, 75).assemble(&pages).unwrap();

        assert_eq!(doc.unrenderable, vec![PageIndex::new(1)]);
        assert_eq!(doc.pages, vec![PageIndex::new(2)]);
        assert_eq!(page_count(&doc.pdf), 1);
    }

    #[test]
    fn media_box_follows_page_size() {
        let composed = DocumentAssembler::new(PageSize::LETTER, 75)
            .compose(&[page(1, ImageFormat::Png, png(5, 5))])
            .unwrap();
        let pages = composed.document.get_pages();
        let page_id = *pages.values().next().unwrap();
        let dict = composed.document.get_dictionary(page_id).unwrap();
        let media_box = dict.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box.len(), 4);
        assert_eq!(media_box[2].as_float().unwrap(), 612.0);
        assert_eq!(media_box[3].as_float().unwrap(), 792.0);
    }

    #[tokio::test]
    async fn assemble_async_matches_sync() {
        let pages = vec![page(1, ImageFormat::Png, png(8, 8))];
        let doc = DocumentAssembler::new(PageSize::A4, 60)
            .assemble_async(pages)
            .await
            .unwrap();
        assert_eq!(page_count(&doc.pdf), 1);
    }
}
