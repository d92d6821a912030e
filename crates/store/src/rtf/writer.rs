//! RTF Writer - Serializes a flat run-based document back to RTF
//!
//! Markup is written back byte for byte. Text is re-encoded, so any text
//! changed through the document model comes out correctly escaped.

use doc_model::FlatDocument;

/// RTF writer that accumulates output bytes
pub struct RtfWriter {
    out: Vec<u8>,
    /// The last markup ended in a control word without its delimiter
    needs_delimiter: bool,
}

impl RtfWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            needs_delimiter: false,
        }
    }

    /// Write a complete flat document
    pub fn write(mut self, doc: &FlatDocument) -> Vec<u8> {
        self.write_raw(&doc.preamble);
        for section in &doc.sections {
            for paragraph in &section.paragraphs {
                for run in &paragraph.runs {
                    self.write_raw(&run.formatting);
                    self.write_text(&run.text);
                }
                self.write_raw(&paragraph.mark);
            }
            self.write_raw(&section.break_mark);
        }
        self.write_raw(&doc.trailer);
        self.out
    }

    /// Write markup verbatim. Markup is read one byte per char, so every
    /// char fits in a byte.
    fn write_raw(&mut self, markup: &str) {
        if markup.is_empty() {
            return;
        }
        self.out.extend(markup.chars().map(|c| c as u32 as u8));
        self.needs_delimiter = ends_with_bare_control_word(markup);
    }

    /// Write text with proper escaping
    fn write_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.needs_delimiter {
            self.out.push(b' ');
            self.needs_delimiter = false;
        }
        for ch in text.chars() {
            match ch {
                '\\' => self.push_str("\\\\"),
                '{' => self.push_str("\\{"),
                '}' => self.push_str("\\}"),
                '\n' => self.push_str("\\line "),
                '\t' => self.push_str("\\tab "),
                '\u{00A0}' => self.push_str("\\~"),
                '\u{00AD}' => self.push_str("\\-"),
                '\u{2011}' => self.push_str("\\_"),
                c if c.is_ascii() => self.out.push(c as u8),
                c if (c as u32) <= 0xFF => self.push_str(&format!("\\'{:02x}", c as u32)),
                c => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        // \u takes a signed 16-bit value
                        self.push_str(&format!("\\u{}?", *unit as i16));
                    }
                }
            }
        }
    }

    fn push_str(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }
}

impl Default for RtfWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `markup` ends in a control word that text could run into
fn ends_with_bare_control_word(markup: &str) -> bool {
    let Some(pos) = markup.rfind('\\') else {
        return false;
    };
    let tail = &markup[pos + 1..];
    let mut chars = tail.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Paragraph, Run, Section};

    fn doc_with_runs(runs: Vec<Run>) -> FlatDocument {
        FlatDocument::new(
            "{\\rtf1\\ansi ",
            vec![Section::with_paragraphs(
                vec![Paragraph::with_runs(runs, "\\par")],
                "",
            )],
            "}",
        )
    }

    #[test]
    fn test_write_simple_document() {
        let doc = doc_with_runs(vec![Run::with_formatting("\\pard ", "Hello")]);
        let out = RtfWriter::new().write(&doc);
        assert_eq!(String::from_utf8(out).unwrap(), "{\\rtf1\\ansi \\pard Hello\\par}");
    }

    #[test]
    fn test_text_escaping() {
        let doc = doc_with_runs(vec![Run::new("a{b}\\c \u{e9} \u{20ac}")]);
        let out = String::from_utf8(RtfWriter::new().write(&doc)).unwrap();
        assert!(out.contains("a\\{b\\}\\\\c \\'e9 \\u8364?"));
    }

    #[test]
    fn test_astral_chars_use_surrogates() {
        let doc = doc_with_runs(vec![Run::new("\u{1F600}")]);
        let out = String::from_utf8(RtfWriter::new().write(&doc)).unwrap();
        assert!(out.contains("\\u-10179?\\u-8704?"));
    }

    #[test]
    fn test_delimiter_inserted_after_bare_control_word() {
        let doc = doc_with_runs(vec![Run::with_formatting("\\b0", "30 days")]);
        let out = String::from_utf8(RtfWriter::new().write(&doc)).unwrap();
        assert!(out.contains("\\b0 30 days"));
    }

    #[test]
    fn test_bare_control_word_detection() {
        assert!(ends_with_bare_control_word("\\pard\\b0"));
        assert!(ends_with_bare_control_word("\\fi-360"));
        assert!(!ends_with_bare_control_word("\\b "));
        assert!(!ends_with_bare_control_word("{\\b}"));
        assert!(!ends_with_bare_control_word("\\'e9"));
        assert!(!ends_with_bare_control_word("plain"));
    }
}
