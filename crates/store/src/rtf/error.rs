//! Error types for RTF operations

use thiserror::Error;

/// Errors that can occur while reading or writing RTF flat documents
#[derive(Debug, Error)]
pub enum RtfError {
    /// IO error (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error in RTF content
    #[error("Parse error at position {position}: {message}")]
    ParseError {
        position: usize,
        message: String,
    },

    /// Invalid RTF structure
    #[error("Invalid RTF structure: {0}")]
    InvalidStructure(String),

    /// Unexpected end of input
    #[error("Unexpected end of file")]
    UnexpectedEof,
}

impl RtfError {
    /// Create a parse error at the given byte position
    pub fn parse_error(position: usize, message: impl Into<String>) -> Self {
        RtfError::ParseError {
            position,
            message: message.into(),
        }
    }
}

/// Result type for RTF operations
pub type RtfResult<T> = std::result::Result<T, RtfError>;
