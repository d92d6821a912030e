//! RTF Import/Export Module
//!
//! This module reads Rich Text Format (RTF) files into a flat run-based
//! [`doc_model::FlatDocument`] and writes them back.
//!
//! ## RTF Structure
//!
//! RTF files consist of:
//! - Control words (e.g., \b for bold, \i for italic)
//! - Control symbols (e.g., \\ for backslash)
//! - Groups (delimited by braces { })
//! - Text content
//!
//! ## Mapping
//!
//! - Header destinations (font table, color table, stylesheet, info, ...)
//!   before the first body content form the document preamble.
//! - `\sect` closes a section, `\par` closes a paragraph.
//! - A run is the text between two pieces of markup. The markup in front of
//!   the text is kept verbatim as the run's formatting, so a document that is
//!   read and written again keeps all of its formatting.
//! - Destinations that hold no body text (`\*` groups, pictures, field
//!   instructions, headers and footers) are carried as opaque markup.

mod api;
mod error;
mod parser;
mod writer;

pub use api::{export_rtf_bytes, import_rtf, import_rtf_bytes};
pub use error::{RtfError, RtfResult};
pub use parser::{RtfToken, RtfTokenizer, SpannedToken};

/// RTF control word constants
pub mod control_words {
    // Document structure
    pub const RTF: &str = "rtf";
    pub const FONTTBL: &str = "fonttbl";
    pub const COLORTBL: &str = "colortbl";
    pub const STYLESHEET: &str = "stylesheet";
    pub const INFO: &str = "info";

    // Body structure
    pub const PARD: &str = "pard";
    pub const PAR: &str = "par";
    pub const PLAIN: &str = "plain";
    pub const SECTD: &str = "sectd";
    pub const SECT: &str = "sect";
    pub const LTRPAR: &str = "ltrpar";
    pub const RTLPAR: &str = "rtlpar";
    pub const TROWD: &str = "trowd";

    // Unicode
    pub const U: &str = "u";
    pub const UC: &str = "uc";

    // Binary data
    pub const BIN: &str = "bin";

    // Opaque body destinations
    pub const PICT: &str = "pict";
    pub const FLDINST: &str = "fldinst";
    pub const OBJECT: &str = "object";
    pub const HEADER: &str = "header";
    pub const HEADERL: &str = "headerl";
    pub const HEADERR: &str = "headerr";
    pub const HEADERF: &str = "headerf";
    pub const FOOTER: &str = "footer";
    pub const FOOTERL: &str = "footerl";
    pub const FOOTERR: &str = "footerr";
    pub const FOOTERF: &str = "footerf";
}

/// Destinations that belong to the document header
const HEADER_DESTINATIONS: &[&str] = &[
    control_words::FONTTBL,
    control_words::COLORTBL,
    control_words::STYLESHEET,
    control_words::INFO,
    "filetbl",
    "listtable",
    "listoverridetable",
    "revtbl",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "mmathPr",
    "pgdsctbl",
    "defchp",
    "defpap",
];

/// Destinations inside the body whose content is never body text
const OPAQUE_DESTINATIONS: &[&str] = &[
    control_words::PICT,
    control_words::FLDINST,
    control_words::OBJECT,
    control_words::HEADER,
    control_words::HEADERL,
    control_words::HEADERR,
    control_words::HEADERF,
    control_words::FOOTER,
    control_words::FOOTERL,
    control_words::FOOTERR,
    control_words::FOOTERF,
    "shppict",
    "nonshppict",
];

/// Control words that can only appear once the body has started
const BODY_START_WORDS: &[&str] = &[
    control_words::PARD,
    control_words::PAR,
    control_words::PLAIN,
    control_words::SECTD,
    control_words::SECT,
    control_words::LTRPAR,
    control_words::RTLPAR,
    control_words::TROWD,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_tables_are_disjoint() {
        for dest in HEADER_DESTINATIONS {
            assert!(!OPAQUE_DESTINATIONS.contains(dest), "{dest}");
        }
        assert!(BODY_START_WORDS.contains(&control_words::PARD));
    }
}
