//! [Content_Types].xml parsing
//!
//! This file defines the content types for all parts in the DOCX package.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::reader::XmlParser;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Represents the content types in a DOCX package
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    /// Default content types by extension (e.g., "xml" -> "application/xml")
    pub defaults: HashMap<String, String>,
    /// Override content types by part name (e.g., "/word/document.xml" -> "...")
    pub overrides: HashMap<String, String>,
}

impl ContentTypes {
    /// Parse [Content_Types].xml from its content
    pub fn parse(content: &str) -> DocxResult<Self> {
        let mut result = Self::default();
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    if XmlParser::matches_element(name.as_ref(), "Default") {
                        if let (Some(ext), Some(ct)) = (
                            XmlParser::get_attribute(e, b"Extension"),
                            XmlParser::get_attribute(e, b"ContentType"),
                        ) {
                            result.defaults.insert(ext, ct);
                        }
                    } else if XmlParser::matches_element(name.as_ref(), "Override") {
                        if let (Some(part), Some(ct)) = (
                            XmlParser::get_attribute(e, b"PartName"),
                            XmlParser::get_attribute(e, b"ContentType"),
                        ) {
                            result.overrides.insert(part, ct);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(DocxError::from(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(result)
    }

    /// Get the content type for a given path
    pub fn get_content_type(&self, path: &str) -> Option<&String> {
        // First check overrides
        let normalized_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if let Some(ct) = self.overrides.get(&normalized_path) {
            return Some(ct);
        }

        // Then check defaults by extension
        if let Some(ext) = path.rsplit('.').next() {
            return self.defaults.get(ext);
        }

        None
    }

    /// Find the part overridden with one of the given content types,
    /// returned without its leading slash
    pub fn find_part(&self, content_types: &[&str]) -> Option<String> {
        let mut parts: Vec<&String> = self
            .overrides
            .iter()
            .filter(|(_, ct)| content_types.contains(&ct.as_str()))
            .map(|(part, _)| part)
            .collect();
        parts.sort();
        parts
            .first()
            .map(|part| part.trim_start_matches('/').to_string())
    }
}
