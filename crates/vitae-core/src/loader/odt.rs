//! ODT loading from `content.xml`.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::docx::{attr_value, read_zip_entry};
use super::{FormatLoader, LoadedDocument, Result};
use crate::error::LoaderError;
use crate::models::{DocumentFormat, LayoutHint};

/// OpenDocument text loader.
pub struct OdtLoader;

impl OdtLoader {
    fn parse(&self, xml: &str) -> Result<LoadedDocument> {
        let mut reader = Reader::from_str(xml);
        let mut loaded = LoadedDocument::default();
        let mut current: Option<(String, LayoutHint)> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| LoaderError::corrupt(format!("content.xml: {}", e)))?;

            match event {
                Event::Start(e) => {
                    let heading = match e.local_name().as_ref() {
                        b"h" => true,
                        b"p" => false,
                        _ => continue,
                    };
                    // Frames may nest paragraphs; flush what came before.
                    if let Some((text, hint)) = current.take() {
                        loaded.push_paragraph(&text, 1, &hint);
                    }
                    let hint = LayoutHint {
                        heading_style: heading,
                        ..Default::default()
                    };
                    current = Some((String::new(), hint));
                }
                Event::Empty(e) => {
                    let Some((text, _)) = current.as_mut() else {
                        continue;
                    };
                    match e.local_name().as_ref() {
                        b"s" => {
                            let count = attr_value(&e, b"c")
                                .and_then(|c| c.parse::<usize>().ok())
                                .unwrap_or(1);
                            text.extend(std::iter::repeat_n(' ', count));
                        }
                        b"tab" => text.push('\t'),
                        b"line-break" => text.push('\n'),
                        _ => {}
                    }
                }
                Event::Text(t) => {
                    if let Some((text, _)) = current.as_mut() {
                        let value = t
                            .unescape()
                            .map_err(|e| LoaderError::corrupt(format!("content.xml: {}", e)))?;
                        text.push_str(&value);
                    }
                }
                Event::End(e) => {
                    if matches!(e.local_name().as_ref(), b"p" | b"h") {
                        if let Some((text, hint)) = current.take() {
                            loaded.push_paragraph(&text, 1, &hint);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // ODT carries no reliable page boundaries.
        loaded.page_count = 1;
        Ok(loaded)
    }
}

impl FormatLoader for OdtLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Odt
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedDocument> {
        let xml = read_zip_entry(bytes, "content.xml")?;
        let loaded = self.parse(&xml)?;
        debug!("ODT: {} lines", loaded.blocks.len());
        Ok(loaded)
    }
}
