//! Document loading: bytes in, text blocks (and page images) out.

mod docx;
mod image;
mod odt;
mod pdf;

pub use docx::DocxLoader;
pub use image::ImageLoader;
pub use odt::OdtLoader;
pub use pdf::PdfLoader;

use ::image::DynamicImage;
use tracing::{debug, info};

use crate::error::LoaderError;
use crate::models::config::LoaderConfig;
use crate::models::{Document, DocumentFormat, LayoutHint, SourceSpan, TextBlock};

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A page rendered or embedded as an image, for OCR.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page number (1-indexed).
    pub page: u32,
    pub image: DynamicImage,
}

/// Raw content of a loaded document.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    /// Raw text; block spans index into it.
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub images: Vec<PageImage>,
    pub page_count: u32,
    /// Non-fatal problems, such as unreadable pages.
    pub warnings: Vec<String>,
}

impl LoadedDocument {
    /// Characters of non-whitespace text.
    pub fn text_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// Append one line as a block.
    pub fn push_line(&mut self, line: &str, page: u32, hint: LayoutHint) {
        let start = self.text.len();
        self.text.push_str(line);
        let end = self.text.len();
        self.text.push('\n');
        self.blocks
            .push(TextBlock::new(line, SourceSpan::new(start, end), page).with_hint(hint));
    }

    /// Append a paragraph, one block per line.
    pub fn push_paragraph(&mut self, paragraph: &str, page: u32, hint: &LayoutHint) {
        for line in paragraph.lines() {
            if !line.trim().is_empty() {
                self.push_line(line, page, hint.clone());
            }
        }
    }
}

/// A loader for one document format.
pub trait FormatLoader {
    fn format(&self) -> DocumentFormat;

    /// Load text blocks and images from raw bytes.
    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument>;
}

/// Dispatches to the format loaders.
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Resolve the format: declared first, sniffed otherwise.
    ///
    /// A declared format contradicted by the content yields the sniffed
    /// format and a warning message.
    pub fn resolve_format(&self, document: &Document) -> Result<(DocumentFormat, Option<String>)> {
        let sniffed = DocumentFormat::sniff(document.bytes());
        match (document.format(), sniffed) {
            (Some(declared), Some(actual)) if declared != actual => {
                debug!(
                    "Declared format {} disagrees with content ({}), using content",
                    declared, actual
                );
                let warning = format!("declared as {} but content is {}", declared, actual);
                Ok((actual, Some(warning)))
            }
            (Some(declared), _) => Ok((declared, None)),
            (None, Some(actual)) => Ok((actual, None)),
            (None, None) => Err(LoaderError::unsupported(
                "format could not be determined from content",
            )),
        }
    }

    /// Load a document into text blocks.
    pub fn load(&self, document: &Document) -> Result<LoadedDocument> {
        if document.bytes().is_empty() {
            return Err(LoaderError::empty("document has no content"));
        }

        let (format, mismatch) = self.resolve_format(document)?;
        info!("Loading {} as {}", document.id(), format);

        let mut loaded = match format {
            DocumentFormat::Pdf => PdfLoader::new(self.config.clone()).load(document.bytes())?,
            DocumentFormat::Docx => DocxLoader.load(document.bytes())?,
            DocumentFormat::Odt => OdtLoader.load(document.bytes())?,
            DocumentFormat::Image => ImageLoader.load(document.bytes())?,
        };

        loaded.warnings.extend(mismatch);

        if loaded.text_chars() == 0 && loaded.images.is_empty() {
            return Err(LoaderError::empty(format!(
                "no text and no images in {} document",
                format
            )));
        }

        debug!(
            "Loaded {} blocks, {} images from {} pages",
            loaded.blocks.len(),
            loaded.images.len(),
            loaded.page_count
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderErrorReason;

    #[test]
    fn test_push_line_spans() {
        let mut doc = LoadedDocument::default();
        doc.push_line("Jane Doe", 1, LayoutHint::default());
        doc.push_paragraph("Line one\n\nLine two", 1, &LayoutHint::default());

        assert_eq!(doc.blocks.len(), 3);
        for block in &doc.blocks {
            assert_eq!(block.span.slice(&doc.text), Some(block.text.as_str()));
        }
        assert_eq!(doc.text, "Jane Doe\nLine one\nLine two\n");
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let loader = Loader::new(LoaderConfig::default());
        let err = loader
            .load(&Document::new("empty.pdf", Vec::new(), Some(DocumentFormat::Pdf)))
            .unwrap_err();
        assert_eq!(err.reason, LoaderErrorReason::EmptyDocument);
    }

    #[test]
    fn test_unknown_content_rejected() {
        let loader = Loader::new(LoaderConfig::default());
        let err = loader
            .load(&Document::new("notes.txt", b"just text".to_vec(), None))
            .unwrap_err();
        assert_eq!(err.reason, LoaderErrorReason::UnsupportedFormat);
    }

    #[test]
    fn test_declared_format_checked_against_content() {
        let loader = Loader::new(LoaderConfig::default());
        let doc = Document::new("cv.docx", b"%PDF-1.4 broken".to_vec(), Some(DocumentFormat::Docx));
        let (format, warning) = loader.resolve_format(&doc).unwrap();
        assert_eq!(format, DocumentFormat::Pdf);
        assert_eq!(warning.as_deref(), Some("declared as docx but content is pdf"));
    }
}
