//! Paragraph - an ordered list of runs closed by a paragraph mark

use crate::Run;
use serde::{Deserialize, Serialize};

/// A paragraph containing text runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Runs in document order
    pub runs: Vec<Run>,
    /// Markup of the paragraph mark that ends this paragraph.
    /// Empty for a paragraph that runs up to the end of its section.
    pub mark: String,
}

impl Paragraph {
    /// Create a new empty paragraph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a paragraph from runs and a closing mark
    pub fn with_runs(runs: Vec<Run>, mark: impl Into<String>) -> Self {
        Self {
            runs,
            mark: mark.into(),
        }
    }

    /// Append a run
    pub fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Get the runs
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Get mutable access to the runs
    pub fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    /// Whether the paragraph has neither runs nor a mark
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.mark.is_empty()
    }

    /// Plain text of the paragraph (all runs concatenated)
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_concatenates_runs() {
        let para = Paragraph::with_runs(
            vec![
                Run::new("Hello "),
                Run::with_formatting("\\b ", "World"),
                Run::markup("\\b0 "),
            ],
            "\\par ",
        );
        assert_eq!(para.text(), "Hello World");
        assert!(!para.is_empty());
    }

    #[test]
    fn test_empty_paragraph() {
        assert!(Paragraph::new().is_empty());
    }
}
