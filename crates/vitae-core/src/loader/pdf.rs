//! PDF text and image loading using lopdf and pdf-extract.

use std::panic::{self, AssertUnwindSafe};

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{FormatLoader, LoadedDocument, PageImage, Result};
use crate::error::LoaderError;
use crate::models::config::LoaderConfig;
use crate::models::{DocumentFormat, LayoutHint};

/// Form feed emitted by pdf-extract between pages.
const PAGE_BREAK: char = '\u{c}';

/// PDF loader.
pub struct PdfLoader {
    config: LoaderConfig,
}

impl PdfLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Parse the document, decrypting empty-password PDFs.
    ///
    /// Returns the document and the bytes pdf-extract should read.
    fn open(&self, data: &[u8]) -> Result<(lopdf::Document, Vec<u8>)> {
        let mut doc = lopdf::Document::load_mem(data)
            .map_err(|e| LoaderError::corrupt(format!("PDF parse error: {}", e)))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(LoaderError::corrupt("PDF is password protected"));
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| LoaderError::corrupt(format!("failed to save decrypted PDF: {}", e)))?;
            return Ok((doc, decrypted));
        }

        Ok((doc, data.to_vec()))
    }

    /// Text per page. pdf-extract panics on some malformed fonts, so a
    /// panic is reported as an empty text layer.
    fn page_texts(&self, raw: &[u8], page_count: usize) -> (Vec<String>, Option<String>) {
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(raw)
        }));

        let text = match extracted {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("PDF text extraction failed: {}", e);
                return (Vec::new(), Some(format!("text extraction failed: {}", e)));
            }
            Err(_) => {
                warn!("PDF text extraction panicked");
                return (Vec::new(), Some("text extraction aborted".to_string()));
            }
        };

        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        while pages.last().is_some_and(|p| p.trim().is_empty()) && pages.len() > page_count {
            pages.pop();
        }
        (pages, None)
    }

    fn page_images(&self, doc: &lopdf::Document, page: u32, page_id: ObjectId) -> Vec<DynamicImage> {
        let mut images = Vec::new();

        if let Some(resources) = page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = image_from_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        trace!("Extracted {} images from page {}", images.len(), page);
        images
    }
}

impl FormatLoader for PdfLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument> {
        let (doc, raw) = self.open(bytes)?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(LoaderError::empty("PDF has no pages"));
        }

        let limit = match self.config.max_pages {
            0 => pages.len(),
            n => n.min(pages.len()),
        };

        let mut loaded = LoadedDocument {
            page_count: limit as u32,
            ..Default::default()
        };

        let (texts, problem) = self.page_texts(&raw, pages.len());
        loaded.warnings.extend(problem);

        // A single chunk for a multi-page document means pdf-extract gave no
        // page breaks; everything is attributed to page 1.
        for (idx, text) in texts.iter().take(limit).enumerate() {
            loaded.push_paragraph(text, idx as u32 + 1, &LayoutHint::default());
        }

        if self.config.extract_images {
            for (&page, &page_id) in pages.iter().take(limit) {
                for image in self.page_images(&doc, page, page_id) {
                    loaded.images.push(PageImage { page, image });
                }
            }
        }

        debug!(
            "PDF: {} pages, {} chars text, {} images",
            loaded.page_count,
            loaded.text_chars(),
            loaded.images.len()
        );
        Ok(loaded)
    }
}

/// Resources dictionary for a page, following `Parent` inheritance.
fn page_resources(doc: &lopdf::Document, node_id: ObjectId) -> Option<Dictionary> {
    let node = doc.get_object(node_id).ok()?;
    if let Object::Dictionary(dict) = node {
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
            return page_resources(doc, *parent_id);
        }
    }
    None
}

fn image_from_object(doc: &lopdf::Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                    .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping image with unsupported filter");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    image_from_raw(&data, width, height, color_space)
}

/// Build an RGBA image from 8-bit RGB or grayscale samples.
fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => return None,
    };
    if data.len() < pixels * channels {
        trace!(
            "Image data too short: {} bytes for {}x{}x{}",
            data.len(),
            width,
            height,
            channels
        );
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for chunk in data[..pixels * channels].chunks(channels) {
        match chunk {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderErrorReason;

    #[test]
    fn test_garbage_is_corrupt() {
        let loader = PdfLoader::new(LoaderConfig::default());
        let err = loader.load(b"%PDF-1.4\nthis is not a pdf").unwrap_err();
        assert_eq!(err.reason, LoaderErrorReason::CorruptContent);
    }

    #[test]
    fn test_image_from_raw_gray() {
        let img = image_from_raw(&[0, 128, 255, 64], 2, 2, b"DeviceGray").unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_image_from_raw_short_data() {
        assert!(image_from_raw(&[0, 0, 0], 2, 2, b"DeviceRGB").is_none());
        assert!(image_from_raw(&[0; 16], 2, 2, b"DeviceCMYK").is_none());
    }
}
