//! Error types for mail merge operations

use thiserror::Error;

/// Errors that can occur during mail merge operations
#[derive(Debug, Error)]
pub enum MailMergeError {
    /// Bad invocation: wrong arguments, missing input file, unsupported
    /// template type
    #[error("Usage error: {0}")]
    Usage(String),

    /// The data source has no sheet or no header row
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// A composed document body is not well-formed
    #[error("Structural parse error: {0}")]
    StructuralParse(String),

    /// Unsupported data file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error reading/writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing CSV data
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing spreadsheet data
    #[error("Spreadsheet parse error: {0}")]
    Xlsx(String),

    /// Error reading or writing a DOCX template
    #[error(transparent)]
    Docx(#[from] store::DocxError),

    /// Error reading an RTF template
    #[error(transparent)]
    Rtf(#[from] store::RtfError),

    /// Error writing the output
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl MailMergeError {
    /// Whether the error comes from how the merge was invoked
    pub fn is_usage(&self) -> bool {
        matches!(self, MailMergeError::Usage(_))
    }
}

impl From<calamine::Error> for MailMergeError {
    fn from(err: calamine::Error) -> Self {
        MailMergeError::Xlsx(err.to_string())
    }
}

/// Result type for mail merge operations
pub type Result<T> = std::result::Result<T, MailMergeError>;
