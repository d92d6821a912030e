//! RTF Parser - Splits RTF content into a flat run-based document
//!
//! Parsing happens in two steps. The tokenizer turns the input into tokens
//! that remember their byte span, then the body builder walks the tokens and
//! groups them into sections, paragraphs and runs. Markup keeps its original
//! bytes; only text is decoded.

use crate::rtf::control_words::*;
use crate::rtf::error::{RtfError, RtfResult};
use crate::rtf::{BODY_START_WORDS, HEADER_DESTINATIONS, OPAQUE_DESTINATIONS};
use doc_model::{FlatDocument, Paragraph, Run, Section};
use std::ops::Range;

/// Token types in RTF
#[derive(Debug, Clone, PartialEq)]
pub enum RtfToken {
    /// Start of a group '{'
    GroupStart,
    /// End of a group '}'
    GroupEnd,
    /// Control word with optional numeric parameter
    ControlWord {
        name: String,
        param: Option<i32>,
    },
    /// Control symbol (e.g., \~ \* \-)
    ControlSymbol(char),
    /// Decoded text content (including \' escapes and escaped braces)
    Text(String),
}

/// A token together with the bytes it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: RtfToken,
    pub span: Range<usize>,
}

/// RTF tokenizer - converts RTF bytes into spanned tokens
pub struct RtfTokenizer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> RtfTokenizer<'a> {
    /// Create a new tokenizer for the given input
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Get the current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Peek at the current byte without advancing
    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    /// Get the current byte and advance
    fn advance(&mut self) -> Option<u8> {
        let byte = self.input.get(self.position).copied();
        if byte.is_some() {
            self.position += 1;
        }
        byte
    }

    /// Skip the single space that delimits a control word
    fn skip_delimiter(&mut self) {
        if let Some(b' ') = self.peek() {
            self.advance();
        }
    }

    /// Read the next token. Line breaks are not significant in RTF; they are
    /// folded into the span of the token that follows them.
    pub fn next_token(&mut self) -> RtfResult<Option<SpannedToken>> {
        let start = self.position;
        while matches!(self.peek(), Some(b'\r') | Some(b'\n')) {
            self.advance();
        }

        let byte = match self.peek() {
            Some(b) => b,
            None => return Ok(None),
        };

        let token = match byte {
            b'{' => {
                self.advance();
                RtfToken::GroupStart
            }
            b'}' => {
                self.advance();
                RtfToken::GroupEnd
            }
            b'\\' => {
                self.advance();
                self.read_control()?
            }
            _ => self.read_text(),
        };

        Ok(Some(SpannedToken {
            token,
            span: start..self.position,
        }))
    }

    /// Read a control word or control symbol
    fn read_control(&mut self) -> RtfResult<RtfToken> {
        let byte = self.peek().ok_or(RtfError::UnexpectedEof)?;

        if !byte.is_ascii_alphabetic() {
            self.advance();
            return Ok(match byte {
                b'\'' => RtfToken::Text(char::from(self.read_hex_byte()?).to_string()),
                b'\\' | b'{' | b'}' => RtfToken::Text((byte as char).to_string()),
                // Line break after backslash is a paragraph mark
                b'\r' | b'\n' => RtfToken::ControlWord {
                    name: PAR.to_string(),
                    param: None,
                },
                _ => RtfToken::ControlSymbol(byte as char),
            });
        }

        let mut name = String::new();
        while let Some(b) = self.peek() {
            if b.is_ascii_alphabetic() {
                name.push(b as char);
                self.advance();
            } else {
                break;
            }
        }

        let param = match self.peek() {
            Some(b) if b == b'-' || b.is_ascii_digit() => Some(self.read_number()?),
            _ => None,
        };

        self.skip_delimiter();

        // \binN is followed by N raw bytes that belong to the control word
        if name == BIN {
            let len = param.unwrap_or(0).max(0) as usize;
            if self.position + len > self.input.len() {
                return Err(RtfError::UnexpectedEof);
            }
            self.position += len;
        }

        Ok(RtfToken::ControlWord { name, param })
    }

    /// Read a numeric parameter (possibly negative)
    fn read_number(&mut self) -> RtfResult<i32> {
        let mut num_str = String::new();

        if let Some(b'-') = self.peek() {
            num_str.push('-');
            self.advance();
        }

        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                num_str.push(b as char);
                self.advance();
            } else {
                break;
            }
        }

        num_str.parse::<i32>().map_err(|_| {
            RtfError::parse_error(self.position, format!("Invalid number: {}", num_str))
        })
    }

    /// Read a hex byte (\'XX format)
    fn read_hex_byte(&mut self) -> RtfResult<u8> {
        let mut hex = String::new();
        for _ in 0..2 {
            match self.advance() {
                Some(b) if b.is_ascii_hexdigit() => hex.push(b as char),
                Some(b) => {
                    return Err(RtfError::parse_error(
                        self.position,
                        format!("Invalid hex character: {}", b as char),
                    ))
                }
                None => return Err(RtfError::UnexpectedEof),
            }
        }
        u8::from_str_radix(&hex, 16).map_err(|_| {
            RtfError::parse_error(self.position, format!("Invalid hex byte: {}", hex))
        })
    }

    /// Read text content until a control character.
    /// Bytes outside ASCII are taken as Latin-1.
    fn read_text(&mut self) -> RtfToken {
        let mut text = String::new();
        while let Some(b) = self.peek() {
            match b {
                b'{' | b'}' | b'\\' | b'\r' | b'\n' => break,
                _ => {
                    text.push(char::from(b));
                    self.advance();
                }
            }
        }
        RtfToken::Text(text)
    }
}

/// Tokenize a complete RTF input
pub fn tokenize(input: &[u8]) -> RtfResult<Vec<SpannedToken>> {
    let mut tokenizer = RtfTokenizer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Parse RTF bytes into a flat run-based document
pub fn parse_flat_document(input: &[u8]) -> RtfResult<FlatDocument> {
    let tokens = tokenize(input)?;

    match (tokens.first().map(|t| &t.token), tokens.get(1).map(|t| &t.token)) {
        (Some(RtfToken::GroupStart), Some(RtfToken::ControlWord { name, .. })) if name == RTF => {}
        _ => {
            return Err(RtfError::InvalidStructure(
                "document does not start with {\\rtf".to_string(),
            ))
        }
    }

    let close = matching_group_end(&tokens, 0)
        .ok_or_else(|| RtfError::InvalidStructure("unbalanced braces".to_string()))?;
    let body_start = find_body_start(&tokens, close);

    let preamble = latin1(&input[..tokens[body_start].span.start]);
    let trailer = latin1(&input[tokens[close].span.start..]);
    let unicode_skip = header_unicode_skip(&tokens[1..body_start]);
    let sections = BodyBuilder::new(input, unicode_skip).build(&tokens[body_start..close])?;

    Ok(FlatDocument::new(preamble, sections, trailer))
}

/// Index of the `GroupEnd` that closes the group opened at `open`
fn matching_group_end(tokens: &[SpannedToken], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, spanned) in tokens.iter().enumerate().skip(open) {
        match spanned.token {
            RtfToken::GroupStart => depth += 1,
            RtfToken::GroupEnd => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Name of the destination a group opens, skipping a leading `\*`
fn group_destination(tokens: &[SpannedToken], open: usize) -> (bool, Option<&str>) {
    let mut index = open + 1;
    let mut ignorable = false;
    if let Some(RtfToken::ControlSymbol('*')) = tokens.get(index).map(|t| &t.token) {
        ignorable = true;
        index += 1;
    }
    match tokens.get(index).map(|t| &t.token) {
        Some(RtfToken::ControlWord { name, .. }) => (ignorable, Some(name.as_str())),
        _ => (ignorable, None),
    }
}

/// Find the first token of the body inside the outer `{\rtf1 ... }` group
fn find_body_start(tokens: &[SpannedToken], close: usize) -> usize {
    let mut index = 2;
    while index < close {
        match &tokens[index].token {
            RtfToken::GroupStart => {
                let (ignorable, dest) = group_destination(tokens, index);
                let is_header = ignorable || dest.is_some_and(|d| HEADER_DESTINATIONS.contains(&d));
                if !is_header {
                    return index;
                }
                index = matching_group_end(tokens, index).map_or(close, |end| end + 1);
            }
            RtfToken::ControlWord { name, .. } if BODY_START_WORDS.contains(&name.as_str()) => {
                return index
            }
            RtfToken::ControlWord { .. } => index += 1,
            RtfToken::Text(text) if text.trim().is_empty() => index += 1,
            _ => return index,
        }
    }
    close
}

/// Fallback count set by the last top-level `\ucN` before the body
fn header_unicode_skip(tokens: &[SpannedToken]) -> usize {
    let mut depth = 0usize;
    let mut skip = 1;
    for spanned in tokens {
        match &spanned.token {
            RtfToken::GroupStart => depth += 1,
            RtfToken::GroupEnd => depth = depth.saturating_sub(1),
            RtfToken::ControlWord { name, param } if depth == 0 && name == UC => {
                skip = param.unwrap_or(1).max(0) as usize;
            }
            _ => {}
        }
    }
    skip
}

/// Convert raw bytes into a string, one char per byte
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Groups body tokens into sections, paragraphs and runs
struct BodyBuilder<'a> {
    input: &'a [u8],
    sections: Vec<Section>,
    section: Section,
    paragraph: Paragraph,
    markup: String,
    text: String,
    /// Fallback characters emitted after each \uN
    unicode_skip: usize,
    /// Fallback characters still to be dropped
    pending_skip: usize,
    /// High surrogate waiting for its pair
    high_surrogate: Option<u16>,
}

impl<'a> BodyBuilder<'a> {
    fn new(input: &'a [u8], unicode_skip: usize) -> Self {
        Self {
            input,
            sections: Vec::new(),
            section: Section::new(),
            paragraph: Paragraph::new(),
            markup: String::new(),
            text: String::new(),
            unicode_skip,
            pending_skip: 0,
            high_surrogate: None,
        }
    }

    fn build(mut self, tokens: &[SpannedToken]) -> RtfResult<Vec<Section>> {
        let mut index = 0;
        while index < tokens.len() {
            let spanned = &tokens[index];
            let raw = latin1(&self.input[spanned.span.clone()]);

            match &spanned.token {
                RtfToken::GroupStart => {
                    let (ignorable, dest) = group_destination(tokens, index);
                    if ignorable || dest.is_some_and(|d| OPAQUE_DESTINATIONS.contains(&d)) {
                        let end = matching_group_end(tokens, index).ok_or_else(|| {
                            RtfError::InvalidStructure("unbalanced braces in body".to_string())
                        })?;
                        let group = latin1(&self.input[spanned.span.start..tokens[end].span.end]);
                        self.push_markup(&group);
                        index = end + 1;
                        continue;
                    }
                    self.pending_skip = 0;
                    self.push_markup(&raw);
                }
                RtfToken::GroupEnd => {
                    self.pending_skip = 0;
                    self.push_markup(&raw);
                }
                RtfToken::ControlWord { name, param } => match name.as_str() {
                    PAR => self.end_paragraph(raw),
                    SECT => self.end_section(raw),
                    U => self.push_unicode(param.unwrap_or(0)),
                    UC => {
                        self.unicode_skip = param.unwrap_or(1).max(0) as usize;
                        self.push_markup(&raw);
                    }
                    _ => self.push_markup(&raw),
                },
                RtfToken::ControlSymbol(symbol) => match symbol {
                    '~' => self.push_text("\u{00A0}"),
                    '_' => self.push_text("\u{2011}"),
                    '-' => self.push_text("\u{00AD}"),
                    _ => self.push_markup(&raw),
                },
                RtfToken::Text(text) => self.push_text(text),
            }
            index += 1;
        }
        Ok(self.finish())
    }

    fn push_markup(&mut self, markup: &str) {
        if !self.text.is_empty() {
            self.flush_run();
        }
        self.markup.push_str(markup);
    }

    fn push_text(&mut self, text: &str) {
        let mut chars = text.chars();
        while self.pending_skip > 0 {
            if chars.next().is_none() {
                return;
            }
            self.pending_skip -= 1;
        }
        self.text.push_str(chars.as_str());
    }

    fn push_unicode(&mut self, param: i32) {
        let unit = if param < 0 { (param + 65536) as u16 } else { param as u16 };
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let decoded: String = char::decode_utf16([high, unit])
                        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                        .collect();
                    self.text.push_str(&decoded);
                } else {
                    self.text.push(char::REPLACEMENT_CHARACTER);
                }
            }
            _ => {
                self.high_surrogate = None;
                self.text
                    .push(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
        }
        self.pending_skip = self.unicode_skip;
    }

    fn flush_run(&mut self) {
        if self.markup.is_empty() && self.text.is_empty() {
            return;
        }
        let run = Run::with_formatting(
            std::mem::take(&mut self.markup),
            std::mem::take(&mut self.text),
        );
        self.paragraph.push_run(run);
    }

    fn end_paragraph(&mut self, mark: String) {
        self.flush_run();
        self.paragraph.mark = mark;
        let paragraph = std::mem::take(&mut self.paragraph);
        self.section.push_paragraph(paragraph);
    }

    fn end_section(&mut self, break_mark: String) {
        self.flush_run();
        if !self.paragraph.is_empty() {
            let paragraph = std::mem::take(&mut self.paragraph);
            self.section.push_paragraph(paragraph);
        }
        self.section.break_mark = break_mark;
        let section = std::mem::take(&mut self.section);
        self.sections.push(section);
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush_run();
        if !self.paragraph.is_empty() {
            let paragraph = std::mem::take(&mut self.paragraph);
            self.section.push_paragraph(paragraph);
        }
        if !self.section.is_empty() {
            self.sections.push(self.section);
        }
        self.sections
    }
}
