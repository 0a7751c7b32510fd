//! Text extraction for grant documents.
//!
//! Callers supply raw bytes and a content type; this module returns plain
//! UTF-8 text. PDF, DOCX, HTML, and plain text/markdown are supported.
//! HTML pages contribute only their `<p>` paragraphs, which drops most
//! navigation and script boilerplate.

use scraper::{Html, Selector};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_HTML: &str = "text/html";
const MIME_XHTML: &str = "application/xhtml+xml";

/// Decompressed size cap for `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Guess a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "html" | "htm" => Some(MIME_HTML),
        _ => None,
    }
}

pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    // Ignore parameters such as "; charset=utf-8".
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(std::str::from_utf8(bytes)?.to_string()),
        MIME_HTML | MIME_XHTML => html_paragraphs(std::str::from_utf8(bytes)?),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Text of every `<p>` element, whitespace-collapsed, one per line.
pub fn html_paragraphs(html: &str) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p").map_err(|e| ExtractError::Html(e.to_string()))?;

    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|p| {
            p.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect();
    Ok(paragraphs.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    paragraphs_from_document_xml(&xml)
}

/// Collect `<w:t>` runs, one output line per `<w:p>` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        paragraphs.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text("Grant für SMEs".as_bytes(), "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "Grant für SMEs");
    }

    #[test]
    fn invalid_utf8_text_errors() {
        let err = extract_text(&[0xff, 0xfe, 0x00], MIME_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::Utf8(_)));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Digital </w:t></w:r><w:r><w:t xml:space="preserve">Upgrade Grant</w:t></w:r></w:p>
    <w:p><w:r><w:t>Open to SMEs &amp; cooperatives</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_text(&docx_with(xml), MIME_DOCX).unwrap();
        assert_eq!(text, "Digital Upgrade Grant\nOpen to SMEs & cooperatives");
    }

    #[test]
    fn docx_without_document_xml_errors() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text(&cursor.into_inner(), MIME_DOCX).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn html_keeps_only_paragraph_text() {
        let html = r#"<html><head><title>MDV</title><script>var x = "<p>no</p>";</script></head>
<body><nav>Home | Grants</nav>
<p>The  Tech Upgrade
   grant funds <b>automation</b>.</p>
<p>   </p>
<div><p>Applicants need an SSM certificate &amp; audited accounts.</p></div>
</body></html>"#;
        let text = extract_text(html.as_bytes(), "text/html; charset=utf-8").unwrap();
        assert_eq!(
            text,
            "The Tech Upgrade grant funds automation.\nApplicants need an SSM certificate & audited accounts."
        );
    }

    #[test]
    fn html_without_paragraphs_is_empty() {
        assert_eq!(html_paragraphs("<div>only a div</div>").unwrap(), "");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/b.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for_path(Path::new("grant.md")), Some(MIME_MARKDOWN));
        assert_eq!(content_type_for_path(Path::new("page.htm")), Some(MIME_HTML));
        assert_eq!(content_type_for_path(Path::new("noext")), None);
    }
}
