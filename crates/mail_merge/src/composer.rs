//! Body composition for tree-structured documents
//!
//! A body container is split into the opening tag, the inner content and
//! the closing tag. Renderings are composed by concatenating their inner
//! content inside a single copy of the container.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{MailMergeError, Result};

/// A body container split at its boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFragment {
    /// Everything up to and including the root start tag
    pub prefix: String,
    /// Content strictly between the root tags, minus any trailing element
    pub inner: String,
    /// Last child element kept out of `inner` (empty when none)
    pub trailing: String,
    /// The root end tag
    pub end_tag: String,
}

impl BodyFragment {
    /// Split a well-formed fragment at its root element
    pub fn split(fragment: &str) -> Result<Self> {
        Self::split_with_trailing(fragment, None)
    }

    /// Split a fragment, moving a last child element named `trailing` out
    /// of the inner content
    pub fn split_with_trailing(fragment: &str, trailing: Option<&str>) -> Result<Self> {
        let bounds = scan(fragment, trailing)?;

        let (prefix, inner, trailing_xml, end_tag) = match bounds.root_end {
            None => {
                // Self-closing root: expand to a start and end tag pair
                let tag = fragment[bounds.root_start..bounds.prefix_end]
                    .trim_end_matches("/>")
                    .trim_end();
                (
                    format!("{}{}>", &fragment[..bounds.root_start], tag),
                    String::new(),
                    String::new(),
                    format!("</{}>", bounds.root_name),
                )
            }
            Some(end_start) => {
                let inner_end = bounds.trailing_start.unwrap_or(end_start);
                (
                    fragment[..bounds.prefix_end].to_string(),
                    fragment[bounds.prefix_end..inner_end].to_string(),
                    fragment[inner_end..end_start].to_string(),
                    fragment[end_start..].to_string(),
                )
            }
        };

        Ok(Self {
            prefix,
            inner,
            trailing: trailing_xml,
            end_tag,
        })
    }

    /// The container without its trailing element
    pub fn region(&self) -> String {
        format!("{}{}{}", self.prefix, self.inner, self.end_tag)
    }

    /// The complete container
    pub fn compose(&self) -> String {
        format!("{}{}{}{}", self.prefix, self.inner, self.trailing, self.end_tag)
    }
}

/// Byte positions found while scanning a fragment
struct Bounds {
    root_name: String,
    root_start: usize,
    /// End of the root start tag
    prefix_end: usize,
    /// Start of the root end tag; `None` for a self-closing root
    root_end: Option<usize>,
    trailing_start: Option<usize>,
}

fn structural_error(message: impl Into<String>) -> MailMergeError {
    MailMergeError::StructuralParse(message.into())
}

fn is_whitespace(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn scan(fragment: &str, trailing: Option<&str>) -> Result<Bounds> {
    let mut reader = Reader::from_str(fragment);
    reader.config_mut().check_end_names = true;

    let mut root: Option<(String, usize, usize)> = None;
    let mut root_end: Option<usize> = None;
    let mut closed = false;
    let mut depth = 0usize;
    // Start of the last direct child and whether it is the trailing element
    let mut last_child: Option<(usize, bool)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| structural_error(format!("malformed body at byte {}: {}", before, e)))?;
        let after = reader.buffer_position() as usize;

        if closed {
            match event {
                Event::Eof => break,
                Event::Text(t) if is_whitespace(&t) => continue,
                Event::Comment(_) | Event::PI(_) => continue,
                _ => return Err(structural_error("content after the end of the body element")),
            }
        }

        match event {
            Event::Start(e) => {
                if root.is_none() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    root = Some((name, before, after));
                } else if depth == 1 {
                    let is_trailing = trailing
                        .is_some_and(|t| local_part(t).as_bytes() == e.local_name().as_ref());
                    last_child = Some((before, is_trailing));
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if root.is_none() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    root = Some((name, before, after));
                    closed = true;
                } else if depth == 1 {
                    let is_trailing = trailing
                        .is_some_and(|t| local_part(t).as_bytes() == e.local_name().as_ref());
                    last_child = Some((before, is_trailing));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    root_end = Some(before);
                    closed = true;
                }
            }
            Event::Text(t) => {
                if root.is_none() && !is_whitespace(&t) {
                    return Err(structural_error("text before the body element"));
                }
                if depth == 1 && !is_whitespace(&t) {
                    last_child = None;
                }
            }
            Event::CData(_) if depth == 1 => last_child = None,
            Event::Eof => {
                return Err(structural_error(if root.is_some() {
                    "body element has no closing tag"
                } else {
                    "fragment has no body element"
                }))
            }
            _ => {}
        }
    }

    let Some((root_name, root_start, prefix_end)) = root else {
        return Err(structural_error("fragment has no body element"));
    };

    Ok(Bounds {
        root_name,
        root_start,
        prefix_end,
        root_end,
        trailing_start: last_child.filter(|(_, is_trailing)| *is_trailing).map(|(start, _)| start),
    })
}

/// Check that a composed fragment parses as a single well-formed element
pub fn validate_fragment(fragment: &str) -> Result<()> {
    scan(fragment, None).map(|_| ())
}

/// Composes N renderings inside one body container
#[derive(Debug, Clone)]
pub struct DocumentBodyComposer {
    template: BodyFragment,
    composed_inner: String,
}

impl DocumentBodyComposer {
    pub fn new(body: &str) -> Result<Self> {
        Ok(Self::from_fragment(BodyFragment::split(body)?))
    }

    /// A composer that keeps the last child element named `trailing` once,
    /// after all renderings
    pub fn with_trailing_element(body: &str, trailing: &str) -> Result<Self> {
        Ok(Self::from_fragment(BodyFragment::split_with_trailing(
            body,
            Some(trailing),
        )?))
    }

    fn from_fragment(template: BodyFragment) -> Self {
        let composed_inner = template.inner.clone();
        Self {
            template,
            composed_inner,
        }
    }

    /// The container as rendered for each record
    pub fn template_region(&self) -> String {
        self.template.region()
    }

    /// Add one rendered container. The first rendering replaces the
    /// template content; later ones are appended in order.
    pub fn append_rendering(&mut self, rendered: &str, is_first: bool) -> Result<()> {
        let rendering = BodyFragment::split(rendered)?;
        if is_first {
            self.composed_inner = rendering.inner;
        } else {
            self.composed_inner.push_str(&rendering.inner);
        }
        Ok(())
    }

    /// Drop all content, leaving the container and its trailing element
    pub fn clear(&mut self) {
        self.composed_inner.clear();
    }

    /// The composed container, checked for well-formedness
    pub fn finish(&self) -> Result<String> {
        let composed = format!(
            "{}{}{}{}",
            self.template.prefix, self.composed_inner, self.template.trailing, self.template.end_tag
        );
        validate_fragment(&composed)?;
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<w:body><w:p><w:r><w:t>Hello ${name}</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240"/></w:sectPr></w:body>"#;

    #[test]
    fn test_split_boundaries() {
        let fragment = BodyFragment::split("<w:body a=\"1\"><w:p/>text</w:body>").unwrap();
        assert_eq!(fragment.prefix, "<w:body a=\"1\">");
        assert_eq!(fragment.inner, "<w:p/>text");
        assert_eq!(fragment.trailing, "");
        assert_eq!(fragment.end_tag, "</w:body>");
    }

    #[test]
    fn test_split_keeps_trailing_element() {
        let fragment = BodyFragment::split_with_trailing(BODY, Some("w:sectPr")).unwrap();
        assert_eq!(fragment.inner, "<w:p><w:r><w:t>Hello ${name}</w:t></w:r></w:p>");
        assert_eq!(fragment.trailing, r#"<w:sectPr><w:pgSz w:w="12240"/></w:sectPr>"#);
        assert_eq!(fragment.compose(), BODY);
    }

    #[test]
    fn test_trailing_element_must_be_last() {
        let body = "<w:body><w:sectPr/><w:p/></w:body>";
        let fragment = BodyFragment::split_with_trailing(body, Some("w:sectPr")).unwrap();
        assert_eq!(fragment.inner, "<w:sectPr/><w:p/>");
        assert!(fragment.trailing.is_empty());
    }

    #[test]
    fn test_self_closing_body() {
        let fragment = BodyFragment::split("<w:body/>").unwrap();
        assert_eq!(fragment.prefix, "<w:body>");
        assert_eq!(fragment.end_tag, "</w:body>");
        assert_eq!(fragment.compose(), "<w:body></w:body>");
    }

    #[test]
    fn test_missing_closing_tag() {
        assert!(matches!(
            BodyFragment::split("<w:body><w:p>text</w:p>"),
            Err(MailMergeError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_mismatched_and_trailing_garbage() {
        assert!(matches!(
            BodyFragment::split("<w:body><w:p></w:r></w:body>"),
            Err(MailMergeError::StructuralParse(_))
        ));
        assert!(matches!(
            BodyFragment::split("<w:body/><w:p/>"),
            Err(MailMergeError::StructuralParse(_))
        ));
        assert!(matches!(
            BodyFragment::split("   "),
            Err(MailMergeError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_compose_renderings_in_order() {
        let mut composer = DocumentBodyComposer::with_trailing_element(BODY, "w:sectPr").unwrap();
        let region = composer.template_region();
        assert!(!region.contains("sectPr"));

        composer
            .append_rendering(&region.replace("${name}", "Alice"), true)
            .unwrap();
        composer
            .append_rendering(&region.replace("${name}", "Bob"), false)
            .unwrap();

        let composed = composer.finish().unwrap();
        assert_eq!(composed.matches("<w:body>").count(), 1);
        assert_eq!(composed.matches("<w:sectPr>").count(), 1);
        let alice = composed.find("Hello Alice").unwrap();
        let bob = composed.find("Hello Bob").unwrap();
        assert!(alice < bob);
        assert!(composed.ends_with("</w:sectPr></w:body>"));
    }

    #[test]
    fn test_unclosed_rendering_is_rejected() {
        let mut composer = DocumentBodyComposer::new("<w:body><w:p/></w:body>").unwrap();
        assert!(matches!(
            composer.append_rendering("<w:body><w:p>", true),
            Err(MailMergeError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_clear_keeps_wrapper() {
        let mut composer = DocumentBodyComposer::with_trailing_element(BODY, "w:sectPr").unwrap();
        composer.clear();
        assert_eq!(
            composer.finish().unwrap(),
            r#"<w:body><w:sectPr><w:pgSz w:w="12240"/></w:sectPr></w:body>"#
        );
    }

    #[test]
    fn test_validate_fragment() {
        assert!(validate_fragment("<a><b/></a>").is_ok());
        assert!(validate_fragment("<a><b></a>").is_err());
    }
}
