//! Error types for the sheetcalc command line

use thiserror::Error;

/// Problems with the command line itself. These exit with status 2.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },

    #[error("Invalid cell assignment '{0}' (expected REF=INPUT)")]
    InvalidAssignment(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
