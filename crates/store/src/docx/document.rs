//! Main document part
//!
//! Splits `word/document.xml` into the markup before the body element, the
//! body element itself and the markup after it. Only the body is ever
//! rewritten; the surrounding markup is kept byte for byte.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::reader::XmlParser;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::ops::Range;

/// The main document part with the location of its body element
#[derive(Debug, Clone)]
pub struct DocumentPart {
    xml: String,
    body: Range<usize>,
}

impl DocumentPart {
    /// Parse a document part and locate its body element
    pub fn parse(xml: impl Into<String>) -> DocxResult<Self> {
        let xml = xml.into();
        let body = locate_body(&xml)?;
        Ok(Self { xml, body })
    }

    /// The complete body element, including its start and end tags
    pub fn body(&self) -> &str {
        &self.xml[self.body.clone()]
    }

    /// Replace the body element
    pub fn set_body(&mut self, body: &str) {
        self.xml.replace_range(self.body.clone(), body);
        self.body = self.body.start..self.body.start + body.len();
    }

    /// The serialized document part
    pub fn to_xml(&self) -> &str {
        &self.xml
    }

    /// Consume the part, returning its serialized bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.xml.into_bytes()
    }
}

/// Byte range of the body element that is a direct child of the root
fn locate_body(xml: &str) -> DocxResult<Range<usize>> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut start = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 1 && XmlParser::matches_element(e.name().as_ref(), "body") {
                    start = Some(before);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && XmlParser::matches_element(e.name().as_ref(), "body") {
                    return Ok(before..reader.buffer_position() as usize);
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && XmlParser::matches_element(e.name().as_ref(), "body") {
                    if let Some(start) = start {
                        return Ok(start..reader.buffer_position() as usize);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(DocxError::InvalidStructure(
        "main document has no body element".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body><w:p><w:r><w:t>Dear ${name}</w:t></w:r></w:p><w:sectPr/></w:body>"#,
        r#"</w:document>"#
    );

    #[test]
    fn test_body_is_located() {
        let part = DocumentPart::parse(DOCUMENT).unwrap();
        assert_eq!(
            part.body(),
            "<w:body><w:p><w:r><w:t>Dear ${name}</w:t></w:r></w:p><w:sectPr/></w:body>"
        );
    }

    #[test]
    fn test_set_body_keeps_surroundings() {
        let mut part = DocumentPart::parse(DOCUMENT).unwrap();
        part.set_body("<w:body/>");
        assert!(part.to_xml().starts_with("<?xml"));
        assert!(part.to_xml().ends_with("<w:body/></w:document>"));
        assert_eq!(part.body(), "<w:body/>");
    }

    #[test]
    fn test_empty_body_element() {
        let part = DocumentPart::parse("<w:document><w:body/></w:document>").unwrap();
        assert_eq!(part.body(), "<w:body/>");
    }

    #[test]
    fn test_nested_body_is_ignored() {
        let xml = "<w:document><w:background><v:body/></w:background><w:body><w:p/></w:body></w:document>";
        let part = DocumentPart::parse(xml).unwrap();
        assert_eq!(part.body(), "<w:body><w:p/></w:body>");
    }

    #[test]
    fn test_missing_body() {
        assert!(matches!(
            DocumentPart::parse("<w:document></w:document>"),
            Err(DocxError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(DocumentPart::parse("<w:document><w:body><w:p></w:body></w:document>").is_err());
    }
}
