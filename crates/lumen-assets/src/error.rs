//! Asset loading errors.

use thiserror::Error;

/// Errors from mesh and shader loading.
#[derive(Error, Debug)]
pub enum AssetError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mesh file parsing failed.
    #[error("Parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// Shader bytecode is not valid SPIR-V.
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, AssetError>;
