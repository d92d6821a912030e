//! Public API for RTF import/export
//!
//! This module provides the main entry points for working with RTF files.

use crate::rtf::error::RtfResult;
use crate::rtf::parser::parse_flat_document;
use crate::rtf::writer::RtfWriter;
use doc_model::FlatDocument;
use std::path::Path;

/// Import an RTF file into a flat document
pub fn import_rtf(path: impl AsRef<Path>) -> RtfResult<FlatDocument> {
    let data = std::fs::read(path.as_ref())?;
    import_rtf_bytes(&data)
}

/// Import RTF from bytes into a flat document
pub fn import_rtf_bytes(data: &[u8]) -> RtfResult<FlatDocument> {
    let doc = parse_flat_document(data)?;
    tracing::debug!(
        sections = doc.sections.len(),
        paragraphs = doc.paragraph_count(),
        "Parsed RTF document"
    );
    Ok(doc)
}

/// Export a flat document to RTF bytes
pub fn export_rtf_bytes(doc: &FlatDocument) -> Vec<u8> {
    RtfWriter::new().write(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Paragraph, Run, Section};
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEMPLATE: &[u8] = b"{\\rtf1\\ansi{\\fonttbl{\\f0 Arial;}}\\pard\\f0 Hello {\\i $\\{name\\}}!\\par}";

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = import_rtf_bytes(TEMPLATE).unwrap();
        assert_eq!(export_rtf_bytes(&doc), TEMPLATE);
    }

    #[test]
    fn test_import_from_file() {
        let mut file = NamedTempFile::with_suffix(".rtf").unwrap();
        file.write_all(TEMPLATE).unwrap();

        let doc = import_rtf(file.path()).unwrap();
        assert_eq!(doc.text(), "Hello ${name}!");
    }

    #[test]
    fn test_import_missing_file() {
        assert!(import_rtf("/nonexistent/template.rtf").is_err());
    }

    proptest! {
        #[test]
        fn prop_text_survives_export_and_import(text in "[a-z ${}\\\\\u{e9}\u{20ac}]{1,24}") {
            let doc = FlatDocument::new(
                "{\\rtf1\\ansi",
                vec![Section::with_paragraphs(
                    vec![Paragraph::with_runs(vec![Run::with_formatting("\\pard", text.clone())], "\\par")],
                    "",
                )],
                "}",
            );
            let reparsed = import_rtf_bytes(&export_rtf_bytes(&doc)).unwrap();
            prop_assert_eq!(reparsed.text(), text);
        }
    }
}
