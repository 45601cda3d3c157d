//! Zone status snapshot

use crate::response::{parse_response, StatusReport, VolumeReport};

/// Volume reported while a zone is muted; the amplifier gives no level then
pub const VOLUME_DEFAULT: i8 = -40;

/// State of one zone at the time it was queried.
///
/// Built from a status frame, or field by field when a caller wants to
/// restore a saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoneStatus {
    pub zone: u8,
    pub power: bool,
    /// Selected input, "1" through "6"
    pub source: String,
    pub mute: bool,
    /// -78 (quietest) to 0; [`VOLUME_DEFAULT`] while muted
    pub volume: i8,
    pub treble: i8,
    pub bass: i8,
    /// Display name from a source-name frame, empty if none was seen
    #[cfg_attr(feature = "serde", serde(default))]
    pub sourcename: String,
}

impl ZoneStatus {
    /// Build a snapshot from parsed status fields
    pub fn from_report(report: &StatusReport) -> Self {
        let (mute, volume) = match report.volume {
            VolumeReport::Level(level) => (false, level),
            VolumeReport::Muted => (true, VOLUME_DEFAULT),
        };

        Self {
            zone: report.zone,
            power: report.power,
            source: report.source.to_string(),
            mute,
            volume,
            treble: 0,
            bass: 0,
            sourcename: String::new(),
        }
    }

    /// Parse a status frame; source-name and unrecognized frames yield `None`
    pub fn from_frame(frame: &str) -> Option<Self> {
        parse_response(frame)?.status().map(Self::from_report)
    }

    /// Attach the display name of the selected source
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.sourcename = name.into();
        self
    }

    /// Selected source as a number, if it is one
    pub fn source_number(&self) -> Option<u8> {
        self.source.trim().parse().ok()
    }
}
