//! Error types for the zone controller

use std::io;
use std::time::Duration;

use nuvo_protocol::ParseError;
use thiserror::Error;

/// Errors surfaced to callers
#[derive(Debug, Error)]
pub enum ControlError {
    /// Failed to open the serial port
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
}

/// Why a single request/response exchange produced no usable reply.
///
/// These never reach callers of the public operations; status queries count
/// them against the retry budget and state-changing commands ignore them.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// No terminated reply before the deadline
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Link failed while sending or reading
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Reply was busy or did not match a known shape
    #[error("unusable response: {0}")]
    Mismatch(#[from] ParseError),

    /// Status frame for a zone other than the one asked about
    #[error("expected zone {expected}, got zone {got}")]
    WrongZone { expected: u8, got: u8 },

    /// Reply parsed but was not a status report
    #[error("unexpected response: {0}")]
    Unexpected(String),
}
