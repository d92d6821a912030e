//! Template documents
//!
//! A template is either tree-structured (a DOCX package whose body is
//! composed from N renderings) or flat (an RTF document whose sections are
//! copied once per record).

use std::path::Path;

use doc_model::{FlatDocument, Section};
use quick_xml::escape::{escape, minimal_escape, partial_escape, unescape};
use store::{export_rtf_bytes, import_rtf, import_rtf_bytes, DocumentPart, DocxPackage};

use crate::composer::DocumentBodyComposer;
use crate::error::{MailMergeError, Result};
use crate::merge_engine::MergeDocument;
use crate::merge_field::find_unresolved;
use crate::run_replacer::RunLevelReplacer;

/// Body-level element describing the final section of a DOCX document
const SECTION_PROPERTIES: &str = "w:sectPr";

/// How a template stores its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Zipped XML package (docx, docm, dotx, dotm)
    Tree,
    /// Flat run-based document (rtf)
    FlatRun,
}

impl TemplateKind {
    /// Choose the template kind from the file extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("docx" | "docm" | "dotx" | "dotm") => Ok(TemplateKind::Tree),
            Some("rtf") => Ok(TemplateKind::FlatRun),
            _ => Err(MailMergeError::Usage(format!(
                "Unsupported template type: {} (expected .docx, .docm, .dotx, .dotm or .rtf)",
                path.display()
            ))),
        }
    }
}

/// A DOCX template rendered by composing its body
#[derive(Debug, Clone)]
pub struct TreeDocument {
    package: DocxPackage,
    part: DocumentPart,
    composer: DocumentBodyComposer,
}

impl TreeDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(DocxPackage::open(path)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_package(DocxPackage::from_bytes(data)?)
    }

    fn from_package(package: DocxPackage) -> Result<Self> {
        let xml = package.part_as_string(package.main_document_path())?;
        let part = DocumentPart::parse(xml)
            .map_err(|e| MailMergeError::StructuralParse(format!("main document: {}", e)))?;
        let composer = DocumentBodyComposer::with_trailing_element(part.body(), SECTION_PROPERTIES)?;
        Ok(Self {
            package,
            part,
            composer,
        })
    }
}

impl MergeDocument for TreeDocument {
    type Region = String;

    fn clone_template_region(&self) -> String {
        self.composer.template_region()
    }

    /// Values are inserted escaped. Tokens are matched in every form a
    /// writer may use for them: `&` and `<` always escaped, `>` and quotes
    /// either literal or escaped.
    fn substitute_placeholder(&self, region: &mut String, token: &str, value: &str) -> usize {
        let value = escape(value);
        token_forms(token)
            .iter()
            .map(|form| {
                let count = region.matches(form.as_str()).count();
                if count > 0 {
                    *region = region.replace(form.as_str(), &value);
                }
                count
            })
            .sum()
    }

    fn unresolved_placeholders(&self, region: &String) -> Vec<String> {
        find_unresolved(region)
            .into_iter()
            .map(|token| {
                // A token broken up by markup is reported up to the markup
                let token = token.split('<').next().unwrap_or_default().to_string();
                unescape(&token).map(|t| t.into_owned()).unwrap_or(token)
            })
            .collect()
    }

    fn append_rendering(&mut self, region: String, is_first: bool) -> Result<()> {
        self.composer.append_rendering(&region, is_first)
    }

    fn clear_template_region(&mut self) -> Result<()> {
        self.composer.clear();
        Ok(())
    }

    fn serialize(mut self) -> Result<Vec<u8>> {
        let body = self.composer.finish()?;
        self.part.set_body(&body);
        let main_document = self.package.main_document_path().to_string();
        self.package.set_part(&main_document, self.part.into_bytes());
        Ok(self.package.to_bytes()?)
    }
}

/// Escaped spellings of a placeholder token in XML text content
fn token_forms(token: &str) -> Vec<String> {
    let mut forms: Vec<String> = Vec::with_capacity(3);
    for form in [minimal_escape(token), partial_escape(token), escape(token)] {
        if !forms.iter().any(|f| *f == *form) {
            forms.push(form.into_owned());
        }
    }
    forms
}

/// An RTF template rendered by copying its sections once per record
#[derive(Debug, Clone)]
pub struct FlatRunDocument {
    document: FlatDocument,
    template: Vec<Section>,
}

impl FlatRunDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(import_rtf(path)?))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::new(import_rtf_bytes(data)?))
    }

    pub fn new(document: FlatDocument) -> Self {
        let template = document.sections().to_vec();
        Self { document, template }
    }
}

impl MergeDocument for FlatRunDocument {
    type Region = Vec<Section>;

    fn clone_template_region(&self) -> Vec<Section> {
        self.template.clone()
    }

    fn substitute_placeholder(&self, region: &mut Vec<Section>, token: &str, value: &str) -> usize {
        RunLevelReplacer::replace_all(region, token, value)
    }

    fn unresolved_placeholders(&self, region: &Vec<Section>) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for run in region.iter().flat_map(|section| section.runs()) {
            for token in find_unresolved(&run.text) {
                if !found.contains(&token) {
                    found.push(token);
                }
            }
        }
        found
    }

    fn append_rendering(&mut self, region: Vec<Section>, is_first: bool) -> Result<()> {
        if is_first {
            self.document.set_sections(region);
        } else {
            self.document.append_sections(region);
        }
        Ok(())
    }

    fn clear_template_region(&mut self) -> Result<()> {
        self.document.set_sections(Vec::new());
        Ok(())
    }

    fn serialize(self) -> Result<Vec<u8>> {
        Ok(export_rtf_bytes(&self.document))
    }
}
