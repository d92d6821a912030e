//! DOCX Package Module
//!
//! This module opens Microsoft Word DOCX packages, exposes the body of the
//! main document part for rewriting and writes the package back.
//! DOCX is based on the Office Open XML (OOXML) format defined in ECMA-376.
//!
//! ## Structure
//!
//! A DOCX file is a ZIP archive containing XML files:
//! - `[Content_Types].xml` - Content type definitions
//! - `_rels/.rels` - Root relationships
//! - `word/document.xml` - Main document content
//! - `word/styles.xml`, `word/media/`, ... - Everything else, carried as is

mod content_types;
mod document;
mod error;
mod package;
mod reader;
mod relationships;

pub use content_types::ContentTypes;
pub use document::DocumentPart;
pub use error::{DocxError, DocxResult};
pub use package::{DocxPackage, PackageEntry};
pub use relationships::{Relationship, Relationships, TargetMode};

/// XML namespaces used in DOCX files
pub mod namespaces {
    /// Main WordprocessingML namespace
    pub const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
}

/// Well-known part names
pub mod paths {
    pub const CONTENT_TYPES: &str = "[Content_Types].xml";
    pub const ROOT_RELS: &str = "_rels/.rels";
    pub const DEFAULT_DOCUMENT: &str = "word/document.xml";
}

/// Relationship types used in DOCX
pub mod relationship_types {
    pub const DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const STRICT_DOCUMENT: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument";
}

/// Content types for DOCX parts
pub mod content_type_values {
    pub const DOCUMENT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
    pub const TEMPLATE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml";
    pub const MACRO_DOCUMENT: &str = "application/vnd.ms-word.document.macroEnabled.main+xml";
    pub const MACRO_TEMPLATE: &str = "application/vnd.ms-word.template.macroEnabledTemplate.main+xml";

    /// Content types a main document part can carry
    pub const MAIN_DOCUMENTS: &[&str] = &[DOCUMENT, TEMPLATE, MACRO_DOCUMENT, MACRO_TEMPLATE];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        assert!(namespaces::W.contains("wordprocessingml"));
        assert_eq!(content_type_values::MAIN_DOCUMENTS.len(), 4);
    }
}
