//! DOCX package container
//!
//! A [`DocxPackage`] keeps every entry of the archive as it was read, in
//! archive order and with its compression method, so a package that is
//! opened, changed in one part and written again differs from the original
//! only in that part.

use crate::docx::content_types::ContentTypes;
use crate::docx::error::{DocxError, DocxResult};
use crate::docx::reader::DocxReader;
use crate::docx::relationships::Relationships;
use crate::docx::{content_type_values, paths, relationship_types};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One entry of the archive
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Entry name inside the archive
    pub name: String,
    /// Uncompressed content
    pub data: Vec<u8>,
    /// Compression method the entry was stored with
    pub compression: CompressionMethod,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// An opened DOCX package
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<PackageEntry>,
    main_document: String,
}

impl DocxPackage {
    /// Open a package from a file on disk
    pub fn open(path: impl AsRef<Path>) -> DocxResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Open a package from bytes in memory
    pub fn from_bytes(data: &[u8]) -> DocxResult<Self> {
        Self::from_reader(Cursor::new(data))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> DocxResult<Self> {
        let mut reader = DocxReader::new(reader)?;
        let entries = reader.read_entries()?;
        let mut package = Self {
            entries,
            main_document: String::new(),
        };
        package.main_document = package.locate_main_document()?;
        tracing::debug!(
            entries = package.entries.len(),
            main_document = %package.main_document,
            "Opened DOCX package"
        );
        Ok(package)
    }

    /// Find the main document part: the officeDocument relationship of the
    /// package, then the content type overrides, then the usual location
    fn locate_main_document(&self) -> DocxResult<String> {
        if let Some(rels) = self.part(paths::ROOT_RELS) {
            let rels = Relationships::parse(&String::from_utf8_lossy(rels))?;
            let target = rels
                .get_by_type(relationship_types::DOCUMENT)
                .or_else(|| rels.get_by_type(relationship_types::STRICT_DOCUMENT))
                .map(|rel| rel.target.trim_start_matches('/').to_string());
            if let Some(target) = target {
                if self.part(&target).is_some() {
                    return Ok(target);
                }
            }
        }

        if let Some(types) = self.part(paths::CONTENT_TYPES) {
            let types = ContentTypes::parse(&String::from_utf8_lossy(types))?;
            if let Some(part) = types.find_part(content_type_values::MAIN_DOCUMENTS) {
                if self.part(&part).is_some() {
                    return Ok(part);
                }
            }
        }

        if self.part(paths::DEFAULT_DOCUMENT).is_some() {
            return Ok(paths::DEFAULT_DOCUMENT.to_string());
        }

        Err(DocxError::MissingPart("main document".to_string()))
    }

    /// Name of the main document part
    pub fn main_document_path(&self) -> &str {
        &self.main_document
    }

    /// Names of all entries in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Raw content of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name && !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Content of a part decoded as UTF-8
    pub fn part_as_string(&self, name: &str) -> DocxResult<String> {
        let data = self
            .part(name)
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
        Ok(String::from_utf8(data.to_vec())?)
    }

    /// Replace the content of a part, adding it at the end if it is new
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    /// Write the package back to a ZIP archive
    pub fn to_bytes(&self) -> DocxResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a small archive from (name, content, method) triples
    pub(crate) fn build_zip(entries: &[(&str, &str, CompressionMethod)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/main.xml"/></Relationships>"#;

    const BODY: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p/></w:body></w:document>"#;

    #[test]
    fn test_main_document_from_relationships() {
        let bytes = build_zip(&[
            ("[Content_Types].xml", "<Types/>", CompressionMethod::Deflated),
            ("_rels/.rels", ROOT_RELS, CompressionMethod::Deflated),
            ("word/main.xml", BODY, CompressionMethod::Deflated),
        ]);
        let package = DocxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(package.main_document_path(), "word/main.xml");
        assert_eq!(package.part_as_string("word/main.xml").unwrap(), BODY);
    }

    #[test]
    fn test_main_document_fallback() {
        let bytes = build_zip(&[("word/document.xml", BODY, CompressionMethod::Deflated)]);
        let package = DocxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(package.main_document_path(), "word/document.xml");
    }

    #[test]
    fn test_missing_main_document() {
        let bytes = build_zip(&[("word/styles.xml", "<w:styles/>", CompressionMethod::Deflated)]);
        assert!(matches!(
            DocxPackage::from_bytes(&bytes),
            Err(DocxError::MissingPart(_))
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            DocxPackage::from_bytes(b"plain text"),
            Err(DocxError::Zip(_))
        ));
    }

    #[test]
    fn test_round_trip_keeps_order_and_compression() {
        let bytes = build_zip(&[
            ("word/document.xml", BODY, CompressionMethod::Deflated),
            ("word/media/image1.png", "PNGDATA", CompressionMethod::Stored),
            ("docProps/core.xml", "<core/>", CompressionMethod::Deflated),
        ]);
        let mut package = DocxPackage::from_bytes(&bytes).unwrap();
        package.set_part("word/document.xml", b"<changed/>".to_vec());

        let reopened = DocxPackage::from_bytes(&package.to_bytes().unwrap()).unwrap();
        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(
            names,
            vec!["word/document.xml", "word/media/image1.png", "docProps/core.xml"]
        );
        assert_eq!(reopened.part("word/document.xml").unwrap(), b"<changed/>");
        assert_eq!(reopened.part("word/media/image1.png").unwrap(), b"PNGDATA");
        assert_eq!(reopened.entries[1].compression, CompressionMethod::Stored);
    }
}
