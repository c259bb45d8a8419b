
use std::io::Read;

use pulldown_cmark::{Event, Options, Parser, TagEnd};
use tracing::debug;

use crate::{RagError, Result};

/// Largest decompressed ZIP entry read while unpacking a DOCX, as zip-bomb
/// protection.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// File formats the extractor understands, detected from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Markdown,
    Pdf,
    Docx,
    Image,
}

impl FileKind {
    /// Map a lowercase extension to a known format.
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Extract plain text from an uploaded file's bytes.
///
/// Failures come back as `RagError::Extraction`; the caller substitutes a
/// placeholder document rather than rejecting the upload.
#[inline]
pub fn extract_text(bytes: &[u8], kind: FileKind) -> Result<String> {
    match kind {
        FileKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        FileKind::Markdown => Ok(markdown_to_text(&String::from_utf8_lossy(bytes))),
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Image => Err(RagError::Extraction(
            "no OCR engine available for image uploads in this build".to_string(),
        )),
    }
}

/// Render Markdown and strip it back down to plain text, keeping paragraph
/// structure so the chunker can cut at paragraph boundaries.
fn markdown_to_text(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut out = String::new();

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::Table,
            ) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    out.trim().to_string()
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF extraction failed: {}", e)))?;
    debug!("Extracted {} characters from PDF", text.len());
    Ok(text)
}

/// Unpack `word/document.xml` from the DOCX archive and walk every `<w:t>`
/// text run, inserting a newline at each paragraph end.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("DOCX archive unreadable: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| RagError::Extraction("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| RagError::Extraction(format!("Failed to read document.xml: {}", e)))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(RagError::Extraction(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text_run = false;
                } else if name.as_ref() == b"p" && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Extraction(format!(
                    "DOCX XML parse error: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    debug!("Extracted {} characters from DOCX", out.len());
    Ok(out)
}
