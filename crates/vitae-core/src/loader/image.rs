//! Image documents: a single page with no text layer.

use tracing::debug;

use super::{FormatLoader, LoadedDocument, PageImage, Result};
use crate::error::LoaderError;
use crate::models::DocumentFormat;

pub struct ImageLoader;

impl FormatLoader for ImageLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Image
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| LoaderError::corrupt(format!("image decode error: {}", e)))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(LoaderError::empty("image has no pixels"));
        }
        debug!("Image: {}x{}", image.width(), image.height());

        Ok(LoadedDocument {
            images: vec![PageImage { page: 1, image }],
            page_count: 1,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderErrorReason;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_png_loads_as_single_page() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 3))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let loaded = ImageLoader.load(&bytes).unwrap();
        assert_eq!(loaded.page_count, 1);
        assert_eq!(loaded.images.len(), 1);
        assert_eq!(loaded.images[0].image.width(), 4);
        assert!(loaded.blocks.is_empty());
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let err = ImageLoader.load(b"\x89PNG\r\n\x1a\n\0\0").unwrap_err();
        assert_eq!(err.reason, LoaderErrorReason::CorruptContent);
    }
}
