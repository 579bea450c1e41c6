//! DOCX loading: `word/document.xml` paragraphs with heading styles.

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::{FormatLoader, LoadedDocument, Result};
use crate::error::LoaderError;
use crate::models::{DocumentFormat, LayoutHint};

/// Read one entry of a zip container as UTF-8.
pub(super) fn read_zip_entry(bytes: &[u8], name: &str) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LoaderError::corrupt(format!("invalid zip container: {}", e)))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| LoaderError::corrupt(format!("missing {}: {}", name, e)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| LoaderError::corrupt(format!("unreadable {}: {}", name, e)))?;
    Ok(xml)
}

/// Attribute value by local name, namespace ignored.
pub(super) fn attr_value(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn is_heading_style(style: &str) -> bool {
    let style = style.to_ascii_lowercase();
    style.starts_with("heading") || style.starts_with("titre") || style == "title"
}

#[derive(Default)]
struct Paragraph {
    text: String,
    hint: LayoutHint,
}

/// DOCX loader.
pub struct DocxLoader;

impl DocxLoader {
    fn parse(&self, xml: &str) -> Result<LoadedDocument> {
        let mut reader = Reader::from_str(xml);
        let mut loaded = LoadedDocument::default();
        let mut page = 1u32;
        let mut paragraph: Option<Paragraph> = None;
        let mut in_text = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| LoaderError::corrupt(format!("document.xml: {}", e)))?;

            match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"p" => paragraph = Some(Paragraph::default()),
                    b"t" => in_text = true,
                    _ => {}
                },
                Event::Empty(e) => {
                    let Some(para) = paragraph.as_mut() else {
                        continue;
                    };
                    match e.local_name().as_ref() {
                        b"tab" => para.text.push('\t'),
                        b"br" | b"cr" => {
                            if attr_value(&e, b"type").as_deref() == Some("page") {
                                page += 1;
                            }
                            para.text.push('\n');
                        }
                        b"pStyle" => {
                            if attr_value(&e, b"val").is_some_and(|s| is_heading_style(&s)) {
                                para.hint.heading_style = true;
                            }
                        }
                        b"sz" => {
                            // Half-points.
                            if let Some(size) = attr_value(&e, b"val").and_then(|v| v.parse::<f32>().ok()) {
                                let points = size / 2.0;
                                if para.hint.font_size.is_none_or(|current| points > current) {
                                    para.hint.font_size = Some(points);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(t) if in_text => {
                    if let Some(para) = paragraph.as_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| LoaderError::corrupt(format!("document.xml: {}", e)))?;
                        para.text.push_str(&text);
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" => {
                        if let Some(para) = paragraph.take() {
                            loaded.push_paragraph(&para.text, page, &para.hint);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        loaded.page_count = page;
        Ok(loaded)
    }
}

impl FormatLoader for DocxLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument> {
        let xml = read_zip_entry(bytes, "word/document.xml")?;
        let loaded = self.parse(&xml)?;
        debug!("DOCX: {} lines over {} pages", loaded.blocks.len(), loaded.page_count);
        Ok(loaded)
    }
}
