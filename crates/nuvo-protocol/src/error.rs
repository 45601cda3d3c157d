//! Error types for Nuvo protocol parsing

use thiserror::Error;

/// Reasons a frame or command body could not be decoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame carried no text at all
    #[error("empty frame")]
    Empty,

    /// Amplifier answered `#Busy`; the request should be repeated
    #[error("amplifier busy")]
    Busy,

    /// Frame matched none of the known response shapes
    #[error("unrecognized frame: {0}")]
    Unrecognized(String),

    /// Command body did not follow the `Z<zone><verb>` grammar
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A numeric field could not be converted
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}
