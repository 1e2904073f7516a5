//! Error types for registration parsing

use thiserror::Error;

/// Result type alias for registration parsing
pub type Result<T> = std::result::Result<T, ParseError>;

/// Why a registration announcement was rejected by the parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Announcement was empty or whitespace
    #[error("empty registration announcement")]
    Empty,

    /// Neither grammar matched and the legacy split did not give four fields
    #[error("expected 4 comma-separated fields, got {0}")]
    FieldCount(usize),

    /// Client name was blank after trimming
    #[error("client name must not be empty")]
    EmptyName,
}
