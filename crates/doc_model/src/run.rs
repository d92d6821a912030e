//! Text run - a contiguous span of text with consistent formatting

use serde::{Deserialize, Serialize};

/// A text run - contiguous text with consistent formatting
///
/// The formatting is carried as the markup that establishes it in the source
/// encoding, kept verbatim so that writing the run back reproduces the
/// template's character formatting exactly. A run may carry markup only
/// (empty text), e.g. a paragraph reset that precedes any visible text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Markup emitted before the text
    pub formatting: String,
    /// The text content of this run
    pub text: String,
}

impl Run {
    /// Create a new run with text content and no formatting markup
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            formatting: String::new(),
            text: text.into(),
        }
    }

    /// Create a new run with formatting markup and text
    pub fn with_formatting(formatting: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            formatting: formatting.into(),
            text: text.into(),
        }
    }

    /// Create a run that carries markup only
    pub fn markup(formatting: impl Into<String>) -> Self {
        Self::with_formatting(formatting, String::new())
    }

    /// Whether this run has no visible text
    pub fn is_markup_only(&self) -> bool {
        self.text.is_empty()
    }

    /// Get the text length in characters
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the run's text contains `pattern`
    pub fn contains(&self, pattern: &str) -> bool {
        !pattern.is_empty() && self.text.contains(pattern)
    }

    /// Replace every occurrence of `pattern` in the run's text, leaving the
    /// formatting untouched. Returns the number of occurrences replaced.
    pub fn replace_text(&mut self, pattern: &str, replacement: &str) -> usize {
        if !self.contains(pattern) {
            return 0;
        }
        let count = self.text.matches(pattern).count();
        self.text = self.text.replace(pattern, replacement);
        count
    }
}
