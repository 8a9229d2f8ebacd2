//! Error types for Sangraha.

use thiserror::Error;

/// Sangraha error type.
///
/// I/O failures and format problems come from persistence; `MapNotAttached`
/// is returned by map-dependent node operations invoked before a local map
/// has been attached.
#[derive(Error, Debug)]
pub enum SangrahaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("No local map attached to this node")]
    MapNotAttached,
}

pub type Result<T> = std::result::Result<T, SangrahaError>;
