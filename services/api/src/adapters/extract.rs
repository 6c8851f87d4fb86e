//! services/api/src/adapters/extract.rs
//!
//! Turns uploaded study material into plain text for the conversation context.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use study_assistant_core::context::document_preamble;
use study_assistant_core::domain::DocumentKind;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file type '{0}'. Please upload a PDF or Word (.docx) file.")]
    Unsupported(String),
    #[error("Could not read the PDF: {0}")]
    Pdf(String),
    #[error("Could not read the Word document: {0}")]
    Docx(String),
}

/// Page text joined with blank lines. Pages without text are skipped.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Paragraph text joined with newlines.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| ExtractError::Docx(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text_run = false;

    loop {
        match reader
            .read_event()
            .map_err(|e| ExtractError::Docx(e.to_string()))?
        {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                let text = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Extracts `bytes` according to the extension of `file_name` and wraps the
/// text in the document preamble.
pub fn extract_document(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_file_name(file_name)
        .ok_or_else(|| ExtractError::Unsupported(file_name.to_string()))?;
    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(bytes)?,
        DocumentKind::Word => extract_docx_text(bytes)?,
    };
    Ok(document_preamble(kind, &text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCX_BODY, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs_joined_with_newlines() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>Chapter 1: Limits</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">A limit is </w:t></w:r><w:r><w:t>the value f approaches &amp; more.</w:t></w:r></w:p>"#,
        );
        assert_eq!(
            extract_docx_text(&bytes).unwrap(),
            "Chapter 1: Limits\nA limit is the value f approaches & more."
        );
    }

    #[test]
    fn test_docx_empty_paragraph_kept() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>One</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Two</w:t></w:r></w:p>"#,
        );
        assert_eq!(extract_docx_text(&bytes).unwrap(), "One\n\nTwo");
    }

    #[test]
    fn test_extract_document_adds_word_preamble() {
        let bytes = docx_with_body(r#"<w:p><w:r><w:t>Chapter 1: Limits</w:t></w:r></w:p>"#);
        assert_eq!(
            extract_document("notes.DOCX", &bytes).unwrap(),
            "User uploaded a Word document. Here are the contents of it:\n\nChapter 1: Limits"
        );
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        assert!(matches!(
            extract_document("notes.txt", b"plain"),
            Err(ExtractError::Unsupported(_))
        ));
    }

    #[test]
    fn test_corrupt_docx_is_an_error() {
        assert!(matches!(
            extract_docx_text(b"not a zip"),
            Err(ExtractError::Docx(_))
        ));
    }
}
