//! Input documents, text blocks and source spans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported résumé formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Odt,
    Image,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 4] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Odt,
        DocumentFormat::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Image => "image",
        }
    }

    /// Format implied by a file extension, without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "odt" => Some(DocumentFormat::Odt),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" | "gif" => {
                Some(DocumentFormat::Image)
            }
            _ => None,
        }
    }

    /// Format implied by a MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or_default().trim();
        match mime {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "application/vnd.oasis.opendocument.text" => Some(DocumentFormat::Odt),
            m if m.starts_with("image/") => Some(DocumentFormat::Image),
            _ => None,
        }
    }

    /// Detect the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let head = &bytes[..bytes.len().min(1024)];
        if contains(head, b"%PDF-") {
            return Some(DocumentFormat::Pdf);
        }
        if bytes.starts_with(b"PK\x03\x04") {
            if contains(bytes, b"word/document.xml") {
                return Some(DocumentFormat::Docx);
            }
            if contains(head, b"application/vnd.oasis.opendocument.text") {
                return Some(DocumentFormat::Odt);
            }
            return None;
        }
        image::guess_format(bytes).ok().map(|_| DocumentFormat::Image)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "odt" => Ok(DocumentFormat::Odt),
            "image" => Ok(DocumentFormat::Image),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// A raw résumé submitted for extraction.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    bytes: Vec<u8>,
    format: Option<DocumentFormat>,
    language: Option<String>,
}

impl Document {
    /// Create a document. When `format` is `None` the loader sniffs the bytes.
    pub fn new(id: impl Into<String>, bytes: Vec<u8>, format: Option<DocumentFormat>) -> Self {
        Self {
            id: id.into(),
            bytes,
            format,
            language: None,
        }
    }

    /// Read a document from disk, taking the format from the extension.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension);
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(id, bytes, format))
    }

    /// Declare the document language, skipping detection.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> Option<DocumentFormat> {
        self.format
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// Half-open byte range `[start, end)` into a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &SourceSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Move the span by `offset` bytes.
    pub fn shift(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }

    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Layout evidence carried alongside a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutHint {
    /// Styled as a heading in the source (DOCX/ODT heading styles).
    #[serde(default)]
    pub heading_style: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f32>,
    /// `[x_min, y_min, x_max, y_max]` in page pixels, for OCR lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
}

/// One line of document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Span in the text this block belongs to.
    pub span: SourceSpan,
    /// Span in the loader's raw text, once the block has been cleaned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<SourceSpan>,
    pub page: u32,
    #[serde(default)]
    pub hint: LayoutHint,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, span: SourceSpan, page: u32) -> Self {
        Self {
            text: text.into(),
            span,
            origin: None,
            page,
            hint: LayoutHint::default(),
        }
    }

    pub fn with_hint(mut self, hint: LayoutHint) -> Self {
        self.hint = hint;
        self
    }
}
