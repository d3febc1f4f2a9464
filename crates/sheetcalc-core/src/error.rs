//! Error types for the document model.

use thiserror::Error;

/// Errors returned by document operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
