//! Error types for storage operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Docx(#[from] crate::docx::DocxError),

    #[error(transparent)]
    Rtf(#[from] crate::rtf::RtfError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
