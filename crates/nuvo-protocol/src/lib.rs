//! Nuvo Protocol Library
//!
//! This crate provides framing, parsing and encoding for the ASCII serial
//! protocol spoken by Nuvo multi-zone amplifiers:
//!
//! - **Concerto**: `#Z0xPWRppp,SRCs,VOL-yy` status reports
//! - **Simplese**: Concerto format plus a `GRPt` group field
//! - **Source names**: `#Z0xSTR+"name"` display strings
//!
//! # Architecture
//!
//! - [`codec`]: a streaming carriage-return frame codec and a [`FrameReader`]
//!   that pulls bytes from a [`Transport`] until a frame is complete
//! - [`response`]: ordered grammars that classify inbound frames
//! - [`command`]: outbound command bodies with the amplifier's clamping rules
//! - [`status`]: the [`ZoneStatus`] snapshot built from a status frame
//!
//! Commands travel as `*<body>\r`, replies as `<text>\r`.
//!
//! # Example
//!
//! ```rust
//! use nuvo_protocol::{EncodeCommand, NuvoCommand, ZoneStatus};
//!
//! let cmd = NuvoCommand::volume(1, -45.7);
//! assert_eq!(cmd.encode(), b"*Z01VOL46\r");
//!
//! let status = ZoneStatus::from_frame("#Z01PWRON,SRC2,VOL-45").unwrap();
//! assert!(status.power);
//! assert_eq!(status.volume, -45);
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod response;
pub mod status;
pub mod transport;

pub use codec::{FrameCodec, FrameRead, FrameReader, TERMINATOR};
pub use command::NuvoCommand;
pub use error::ParseError;
pub use response::{parse_frame, parse_response, Response, StatusReport, VolumeReport};
pub use status::{ZoneStatus, VOLUME_DEFAULT};
pub use transport::Transport;

/// Amplifier family, identified by the shape of its status reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Model {
    /// Concerto series (no group field)
    Concerto,
    /// Simplese series (status carries a `GRP` field)
    Simplese,
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
