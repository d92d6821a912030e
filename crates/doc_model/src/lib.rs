//! Document Model - Flat run-based document structure
//!
//! This crate provides the document model used for run-level editing of
//! flat documents: a document is an ordered list of sections, a section an
//! ordered list of paragraphs, and a paragraph an ordered list of runs.
//! A run is the smallest span of text sharing one formatting.

mod document;
mod paragraph;
mod run;
pub mod section;

pub use document::*;
pub use paragraph::*;
pub use run::*;
pub use section::*;
