//! Plain-text extraction for document files.
//!
//! Every format is reduced to the same shape: one paragraph per line,
//! each paragraph trimmed, empty paragraphs dropped. Word documents keep
//! their `<w:p>` structure; PDFs and text files are normalised line by line.
//!
//! Extraction never panics on malformed input; it returns an
//! [`ExtractError`] and the ingestion pipeline skips the file.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported document kinds, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Docx,
    Pdf,
    Text,
}

impl DocumentKind {
    /// Map a file extension (case-insensitive, no dot) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(DocumentKind::Docx),
            "pdf" => Some(DocumentKind::Pdf),
            "txt" | "md" | "markdown" | "text" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Read `path` and return its paragraph-normalised text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let kind = DocumentKind::from_extension(ext)
        .ok_or_else(|| ExtractError::Unsupported(path.display().to_string()))?;

    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes, kind)
}

/// Extract paragraph-normalised text from in-memory file contents.
pub fn extract_bytes(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map(|text| normalize_paragraphs(&text))
            .map_err(|e| ExtractError::Pdf(e.to_string())),
        DocumentKind::Text => Ok(normalize_paragraphs(&String::from_utf8_lossy(bytes))),
    }
}

/// Collapse text to one trimmed, non-empty paragraph per line.
pub fn normalize_paragraphs(text: &str) -> String {
    join_paragraphs(text.lines())
}

fn join_paragraphs<'a>(paragraphs: impl Iterator<Item = &'a str>) -> String {
    paragraphs
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
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

    let paragraphs = docx_paragraphs(&xml)?;
    Ok(join_paragraphs(paragraphs.iter().map(String::as_str)))
}

/// Collect the text of each `<w:p>` element, concatenating its `<w:t>` runs.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_docx(document_xml: &str) -> Vec<u8> {
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
    fn test_docx_paragraphs_joined_by_newline() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly </w:t></w:r><w:r><w:t>report</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue &amp; costs</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_bytes(&build_docx(xml), DocumentKind::Docx).unwrap();
        assert_eq!(text, "Quarterly report\nRevenue & costs");
    }

    #[test]
    fn test_docx_without_text_is_empty() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p/></w:body></w:document>"#;
        let text = extract_bytes(&build_docx(xml), DocumentKind::Docx).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract_bytes(b"not a zip", DocumentKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_bytes(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_text_normalisation() {
        let text = extract_bytes(
            b"  Title  \n\n\n  First line.\r\n\tSecond line.\n   \n",
            DocumentKind::Text,
        )
        .unwrap();
        assert_eq!(text, "Title\nFirst line.\nSecond line.");
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("DOCX"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_extension("md"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_extension("exe"), None);
    }

    #[test]
    fn test_unsupported_file() {
        let err = extract_file(Path::new("/tmp/whatever.bin")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }
}
