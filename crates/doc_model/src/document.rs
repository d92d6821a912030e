//! Flat run-based document

use crate::{Run, Section};
use serde::{Deserialize, Serialize};

/// A flat run-based document: `sections -> paragraphs -> runs`
///
/// `preamble` and `trailer` hold the markup that surrounds the body in the
/// source encoding (document header, font and color tables, closing group).
/// They are emitted once, around the sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatDocument {
    /// Markup before the first section
    pub preamble: String,
    /// Body sections in document order
    pub sections: Vec<Section>,
    /// Markup after the last section
    pub trailer: String,
}

impl FlatDocument {
    /// Create a document from its parts
    pub fn new(preamble: impl Into<String>, sections: Vec<Section>, trailer: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            sections,
            trailer: trailer.into(),
        }
    }

    /// Get the sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Replace the body with `sections`
    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
    }

    /// Append `sections` after the current body
    pub fn append_sections(&mut self, sections: Vec<Section>) {
        self.sections.extend(sections);
    }

    /// Number of paragraphs across all sections
    pub fn paragraph_count(&self) -> usize {
        self.sections.iter().map(|s| s.paragraphs.len()).sum()
    }

    /// Iterate over all runs in document order
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.sections.iter().flat_map(|s| s.runs())
    }

    /// Plain text of the body, one line per paragraph
    pub fn text(&self) -> String {
        self.sections
            .iter()
            .flat_map(|s| s.paragraphs.iter())
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Paragraph;

    fn sample_section(text: &str) -> Section {
        Section::with_paragraphs(
            vec![Paragraph::with_runs(vec![Run::new(text)], "\\par ")],
            "",
        )
    }

    #[test]
    fn test_append_and_replace_sections() {
        let mut doc = FlatDocument::new("{\\rtf1 ", vec![sample_section("template")], "}");
        doc.set_sections(vec![sample_section("one")]);
        doc.append_sections(vec![sample_section("two")]);

        assert_eq!(doc.sections().len(), 2);
        assert_eq!(doc.paragraph_count(), 2);
        assert_eq!(doc.text(), "one\ntwo");
    }

    #[test]
    fn test_runs_in_order() {
        let doc = FlatDocument::new("", vec![sample_section("a"), sample_section("b")], "");
        let texts: Vec<&str> = doc.runs().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
