//! Outbound command encoding
//!
//! Every command body starts with `Z` and the zone as two zero-padded digits,
//! followed by a verb and an optional value. On the wire the body is wrapped
//! as `*<body>\r`.
//!
//! | Command | Body |
//! |---------|------|
//! | Status query | `Z01STATUS` |
//! | Power | `Z01ON`, `Z01OFF` |
//! | Mute | `Z01MTON`, `Z01MTOFF` |
//! | Volume | `Z01VOL45` (attenuation, sign never sent) |
//! | Treble / Bass | `Z01TREB-5`, `Z01BASS05` |
//! | Source | `Z01SRC3` |

use std::fmt;
use std::str::FromStr;

use crate::codec::TERMINATOR;
use crate::error::ParseError;
use crate::status::VOLUME_DEFAULT;
use crate::EncodeCommand;

/// Marker that opens every outbound command
pub const COMMAND_PREFIX: u8 = b'*';

/// Largest attenuation the amplifier accepts
pub const MAX_ATTENUATION: u8 = 78;

/// Treble / bass range
pub const TONE_MIN: i8 = -12;
pub const TONE_MAX: i8 = 12;

/// Source input range
pub const SOURCE_MIN: u8 = 1;
pub const SOURCE_MAX: u8 = 6;

/// Nuvo protocol command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NuvoCommand {
    /// Zone status query: Z01STATUS
    Status { zone: u8 },
    /// Power: Z01ON / Z01OFF
    Power { zone: u8, on: bool },
    /// Mute: Z01MTON / Z01MTOFF
    Mute { zone: u8, on: bool },
    /// Volume as attenuation magnitude: Z01VOL45
    Volume { zone: u8, attenuation: u8 },
    /// Treble: Z01TREB-5
    Treble { zone: u8, level: i8 },
    /// Bass: Z01BASS05
    Bass { zone: u8, level: i8 },
    /// Source select: Z01SRC3
    Source { zone: u8, source: u8 },
}

impl NuvoCommand {
    pub fn status(zone: u8) -> Self {
        Self::Status { zone }
    }

    pub fn power(zone: u8, on: bool) -> Self {
        Self::Power { zone, on }
    }

    pub fn mute(zone: u8, on: bool) -> Self {
        Self::Mute { zone, on }
    }

    /// Volume from a signed level (0 loudest, negative quieter).
    ///
    /// The sign is dropped and the magnitude rounded; a non-finite level
    /// falls back to the muted default of 40.
    pub fn volume(zone: u8, volume: f64) -> Self {
        Self::Volume {
            zone,
            attenuation: attenuation(volume),
        }
    }

    /// Volume from a text token such as `-45` or `30.5`; anything that is
    /// not a number falls back to the muted default of 40.
    pub fn volume_token(zone: u8, token: &str) -> Self {
        let volume = token.trim().parse::<f64>().unwrap_or(f64::NAN);
        Self::volume(zone, volume)
    }

    /// Treble clamped to -12..=12
    pub fn treble(zone: u8, treble: i32) -> Self {
        Self::Treble {
            zone,
            level: clamp_tone(treble),
        }
    }

    /// Bass clamped to -12..=12
    pub fn bass(zone: u8, bass: i32) -> Self {
        Self::Bass {
            zone,
            level: clamp_tone(bass),
        }
    }

    /// Source clamped to 1..=6
    pub fn source(zone: u8, source: i32) -> Self {
        Self::Source {
            zone,
            source: source.clamp(SOURCE_MIN as i32, SOURCE_MAX as i32) as u8,
        }
    }

    /// Zone the command is addressed to
    pub fn zone(&self) -> u8 {
        match *self {
            Self::Status { zone }
            | Self::Power { zone, .. }
            | Self::Mute { zone, .. }
            | Self::Volume { zone, .. }
            | Self::Treble { zone, .. }
            | Self::Bass { zone, .. }
            | Self::Source { zone, .. } => zone,
        }
    }

    /// Returns true for commands that only read state
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// Command body without the `*` marker and terminator
    pub fn body(&self) -> String {
        match *self {
            Self::Status { zone } => format!("Z{:02}STATUS", zone),
            Self::Power { zone, on: true } => format!("Z{:02}ON", zone),
            Self::Power { zone, on: false } => format!("Z{:02}OFF", zone),
            Self::Mute { zone, on: true } => format!("Z{:02}MTON", zone),
            Self::Mute { zone, on: false } => format!("Z{:02}MTOFF", zone),
            Self::Volume { zone, attenuation } => format!("Z{:02}VOL{:02}", zone, attenuation),
            Self::Treble { zone, level } => format!("Z{:02}TREB{:02}", zone, level),
            Self::Bass { zone, level } => format!("Z{:02}BASS{:02}", zone, level),
            Self::Source { zone, source } => format!("Z{:02}SRC{}", zone, source),
        }
    }

    /// Decode a command body, with or without the `*` marker and terminator
    pub fn parse(cmd: &str) -> Result<Self, ParseError> {
        let body = cmd.strip_prefix(COMMAND_PREFIX as char).unwrap_or(cmd);
        let body = body
            .strip_suffix(TERMINATOR as char)
            .unwrap_or(body)
            .trim();

        let invalid = || ParseError::InvalidCommand(cmd.to_string());

        let rest = body.strip_prefix('Z').ok_or_else(invalid)?;
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid());
        }
        let zone = parse_field::<u8>("zone", &rest[..digits])?;
        let verb = &rest[digits..];

        match verb {
            "STATUS" => Ok(Self::Status { zone }),
            "ON" => Ok(Self::Power { zone, on: true }),
            "OFF" => Ok(Self::Power { zone, on: false }),
            "MTON" => Ok(Self::Mute { zone, on: true }),
            "MTOFF" => Ok(Self::Mute { zone, on: false }),
            _ => {
                if let Some(value) = verb.strip_prefix("VOL") {
                    let attenuation = parse_field::<u8>("volume", value)?;
                    Ok(Self::Volume {
                        zone,
                        attenuation: attenuation.min(MAX_ATTENUATION),
                    })
                } else if let Some(value) = verb.strip_prefix("TREB") {
                    Ok(Self::treble(zone, parse_field("treble", value)?))
                } else if let Some(value) = verb.strip_prefix("BASS") {
                    Ok(Self::bass(zone, parse_field("bass", value)?))
                } else if let Some(value) = verb.strip_prefix("SRC") {
                    Ok(Self::source(zone, parse_field("source", value)?))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl EncodeCommand for NuvoCommand {
    fn encode(&self) -> Vec<u8> {
        let body = self.body();
        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(COMMAND_PREFIX);
        out.extend_from_slice(body.as_bytes());
        out.push(TERMINATOR);
        out
    }
}

impl fmt::Display for NuvoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body())
    }
}

impl FromStr for NuvoCommand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn attenuation(volume: f64) -> u8 {
    if !volume.is_finite() {
        return VOLUME_DEFAULT.unsigned_abs();
    }
    volume
        .abs()
        .round_ties_even()
        .min(MAX_ATTENUATION as f64) as u8
}

fn clamp_tone(level: i32) -> i8 {
    level.clamp(TONE_MIN as i32, TONE_MAX as i32) as i8
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}
