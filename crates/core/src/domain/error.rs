// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Duplicate process name: {0}")]
    DuplicateName(String),

    #[error("Unknown process name: {0}")]
    UnknownName(String),

    #[error("Unsupported exec_mode '{mode}' for process '{name}'")]
    UnsupportedExecMode { name: String, mode: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
