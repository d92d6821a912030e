//! Store - Document packages and file I/O
//!
//! This crate reads and writes the document containers used by mail merge:
//! DOCX packages, whose main document body is rewritten in place, and RTF
//! files, which are parsed into a flat run-based document. It also provides
//! atomic file output.

mod error;
mod file_io;
pub mod docx;
pub mod rtf;

pub use error::*;
pub use file_io::*;

// Re-export DOCX functionality
pub use docx::{DocumentPart, DocxError, DocxPackage, DocxResult};

// Re-export RTF functionality
pub use rtf::{export_rtf_bytes, import_rtf, import_rtf_bytes, RtfError, RtfResult};
