//! ZIP archive reading and XML parsing utilities

use crate::docx::error::DocxResult;
use crate::docx::package::PackageEntry;
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// A wrapper around a ZIP archive for reading DOCX files
pub struct DocxReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> DocxReader<R> {
    /// Create a new DOCX reader from a source that implements Read + Seek
    pub fn new(reader: R) -> DocxResult<Self> {
        let archive = ZipArchive::new(reader)?;
        Ok(Self { archive })
    }

    /// Read every entry of the archive in archive order
    pub fn read_entries(&mut self) -> DocxResult<Vec<PackageEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let mut file = self.archive.by_index(index)?;
            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)?;
            }
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }
}

/// XML reader utilities for parsing DOCX XML content
pub struct XmlParser;

impl XmlParser {
    /// Create a new XML reader from a string
    pub fn from_string(content: &str) -> Reader<&[u8]> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        reader
    }

    /// Get an attribute value from an event
    pub fn get_attribute(event: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
        event.attributes()
            .filter_map(|a| a.ok())
            .find(|a| a.key.as_ref() == name)
            .map(|a| String::from_utf8_lossy(&a.value).to_string())
    }

    /// Check if an element name matches with optional namespace prefix
    pub fn matches_element(name: &[u8], expected: &str) -> bool {
        let name_str = std::str::from_utf8(name).unwrap_or("");
        name_str == expected || name_str.ends_with(&format!(":{}", expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;

    #[test]
    fn test_matches_element() {
        assert!(XmlParser::matches_element(b"w:body", "body"));
        assert!(XmlParser::matches_element(b"body", "body"));
        assert!(!XmlParser::matches_element(b"w:bodyPr", "body"));
    }

    #[test]
    fn test_get_attribute() {
        let mut reader = XmlParser::from_string(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        let mut buf = Vec::new();
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Empty(e) => {
                assert_eq!(XmlParser::get_attribute(&e, b"Extension").as_deref(), Some("xml"));
                assert_eq!(XmlParser::get_attribute(&e, b"Missing"), None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
