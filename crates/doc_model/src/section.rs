//! Section - a run of paragraphs sharing page setup, closed by a section break

use crate::{Paragraph, Run};
use serde::{Deserialize, Serialize};

/// A document section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Paragraphs in document order
    pub paragraphs: Vec<Paragraph>,
    /// Markup of the section break that ends this section.
    /// Empty for the last section of a document.
    pub break_mark: String,
}

impl Section {
    /// Create a new empty section
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a section from paragraphs and a closing break
    pub fn with_paragraphs(paragraphs: Vec<Paragraph>, break_mark: impl Into<String>) -> Self {
        Self {
            paragraphs,
            break_mark: break_mark.into(),
        }
    }

    /// Append a paragraph
    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }

    /// Get the paragraphs
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Whether the section has neither paragraphs nor a break
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.break_mark.is_empty()
    }

    /// Iterate over all runs of the section in document order
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.paragraphs.iter().flat_map(|p| p.runs.iter())
    }

    /// Iterate mutably over all runs of the section in document order
    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.paragraphs.iter_mut().flat_map(|p| p.runs.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_iterates_all_paragraphs() {
        let section = Section::with_paragraphs(
            vec![
                Paragraph::with_runs(vec![Run::new("a"), Run::new("b")], "\\par "),
                Paragraph::with_runs(vec![Run::new("c")], ""),
            ],
            "",
        );
        let texts: Vec<&str> = section.runs().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_runs_mut() {
        let mut section = Section::with_paragraphs(
            vec![Paragraph::with_runs(vec![Run::new("x")], "")],
            "\\sect ",
        );
        for run in section.runs_mut() {
            run.text.push('!');
        }
        assert_eq!(section.paragraphs[0].text(), "x!");
    }
}
