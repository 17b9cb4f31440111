//! Content normalization: plain text out of arbitrary file bytes.
//!
//! A closed table of format handlers, one per supported media type. The
//! public entry point never fails: an unknown media type or a failing
//! handler degrades to empty text with a diagnostic, so one unreadable file
//! never aborts a batch.

use std::io::Read;
use thiserror::Error;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_ZIP: &str = "application/zip";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Maximum decompressed bytes read from a single OOXML part (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

type Handler = fn(&[u8]) -> Result<String, ExtractError>;

/// The closed set of format handlers. Unknown types fall through to the
/// degraded-empty-text path in [`normalize`].
fn handler_for(media_type: &str) -> Option<Handler> {
    match media_type {
        MIME_TEXT | MIME_MARKDOWN | MIME_CSV => Some(extract_plain),
        MIME_PDF => Some(extract_pdf),
        MIME_DOCX => Some(extract_docx),
        _ => None,
    }
}

/// Whether a registered extractor exists for the media type.
pub fn is_supported(media_type: &str) -> bool {
    handler_for(media_type).is_some()
}

/// Extract plain text from file bytes. Never fails: on an unknown media
/// type or a handler error this returns an empty string and emits a
/// diagnostic, and the caller continues with an unsearchable document.
pub fn normalize(bytes: &[u8], media_type: &str) -> String {
    match handler_for(media_type) {
        None => {
            tracing::warn!(media_type, "no extractor registered, storing without text");
            String::new()
        }
        Some(handler) => match handler(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(media_type, error = %e, "extraction failed, degrading to empty text");
                String::new()
            }
        },
    }
}

/// Map a filename's extension to a media type. One lookup table; unknown
/// extensions map to `application/octet-stream`.
pub fn media_type_for_path(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "log" => MIME_TEXT,
        "md" | "markdown" => MIME_MARKDOWN,
        "csv" => MIME_CSV,
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "zip" => MIME_ZIP,
        _ => MIME_OCTET_STREAM,
    }
}

fn extract_plain(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Ooxml(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }
    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
