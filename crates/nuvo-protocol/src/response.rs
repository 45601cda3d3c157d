//! Response frame grammars
//!
//! Every reply from the amplifier is matched against three fixed grammars, in
//! this order:
//!
//! 1. Concerto status: `Z0<d>PWR<ON|OFF>,SRC<d>,VOL<-dd|MT>`
//! 2. Simplese status: `Z0<d>PWR<ON|OFF>,SRC<d>,GRP<0|1>,VOL<-dd|MT|XM>`
//! 3. Source name: `Z0<d>STR+"<name>"`
//!
//! A grammar may start anywhere in the frame, so the conventional `#` prefix
//! is tolerated, and anything after a complete match is ignored. The zone is
//! a single digit after the literal `Z0`, so zones 10 and up cannot appear in
//! a reply.

use tracing::debug;

use crate::error::ParseError;

/// Literal the amplifier sends when it cannot service a request yet
pub const BUSY: &str = "#Busy";

/// Volume field of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VolumeReport {
    /// Attenuation in dB, 0 (loudest) down to -78; never positive, and
    /// encoded as 0 if it is
    Level(i8),
    /// `MT` or `XM`; the amplifier does not report a level while muted
    Muted,
}

/// Fields shared by both status shapes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusReport {
    pub zone: u8,
    pub power: bool,
    pub source: u8,
    /// Group membership, Simplese only
    pub group: Option<bool>,
    pub volume: VolumeReport,
}

/// A classified reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Response {
    /// Concerto-style zone status
    Concerto(StatusReport),
    /// Simplese-style zone status (with group)
    Simplese(StatusReport),
    /// Display name of the source selected on a zone
    SourceName { zone: u8, name: String },
}

impl Response {
    /// Zone the frame reports on
    pub fn zone(&self) -> u8 {
        match self {
            Response::Concerto(report) | Response::Simplese(report) => report.zone,
            Response::SourceName { zone, .. } => *zone,
        }
    }

    /// Status fields, if this is a status frame
    pub fn status(&self) -> Option<&StatusReport> {
        match self {
            Response::Concerto(report) | Response::Simplese(report) => Some(report),
            Response::SourceName { .. } => None,
        }
    }

    /// Render the frame as the amplifier would send it (without terminator)
    pub fn encode(&self) -> String {
        match self {
            Response::Concerto(r) => format!(
                "#Z0{}PWR{},SRC{},VOL{}",
                r.zone,
                on_off(r.power),
                r.source,
                encode_volume(r.volume)
            ),
            Response::Simplese(r) => format!(
                "#Z0{}PWR{},SRC{},GRP{},VOL{}",
                r.zone,
                on_off(r.power),
                r.source,
                u8::from(r.group.unwrap_or(false)),
                encode_volume(r.volume)
            ),
            Response::SourceName { zone, name } => format!("#Z0{}STR+\"{}\"", zone, name),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

fn encode_volume(volume: VolumeReport) -> String {
    match volume {
        VolumeReport::Level(level) => format!("-{:02}", level.clamp(-99, 0).unsigned_abs()),
        VolumeReport::Muted => "MT".to_string(),
    }
}

/// Classify a frame, reporting why it did not match.
pub fn parse_frame(frame: &str) -> Result<Response, ParseError> {
    if frame.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(report) = search(frame, concerto_status) {
        debug!("Concerto status match");
        return Ok(Response::Concerto(report));
    }

    if let Some(report) = search(frame, simplese_status) {
        debug!("Simplese status match");
        return Ok(Response::Simplese(report));
    }

    if let Some((zone, name)) = search(frame, source_name) {
        debug!("Source name match");
        return Ok(Response::SourceName { zone, name });
    }

    if frame == BUSY {
        debug!("Busy response - try again");
        return Err(ParseError::Busy);
    }

    debug!("No match - {:?}", frame);
    Err(ParseError::Unrecognized(frame.to_string()))
}

/// Classify a frame; busy and unrecognized frames both yield `None`.
pub fn parse_response(frame: &str) -> Option<Response> {
    parse_frame(frame).ok()
}

/// Try `grammar` at every `Z0` in the frame, first match wins
fn search<T>(frame: &str, grammar: impl Fn(&mut Cursor<'_>) -> Option<T>) -> Option<T> {
    frame
        .match_indices("Z0")
        .find_map(|(start, _)| grammar(&mut Cursor::new(&frame[start..])))
}

fn concerto_status(cur: &mut Cursor<'_>) -> Option<StatusReport> {
    let (zone, power, source) = status_prefix(cur)?;
    cur.literal(",VOL")?;
    let volume = volume(cur, &["MT"])?;

    Some(StatusReport {
        zone,
        power,
        source,
        group: None,
        volume,
    })
}

fn simplese_status(cur: &mut Cursor<'_>) -> Option<StatusReport> {
    let (zone, power, source) = status_prefix(cur)?;
    cur.literal(",GRP")?;
    let group = cur.one_of(&["0", "1"])? == "1";
    cur.literal(",VOL")?;
    let volume = volume(cur, &["MT", "XM"])?;

    Some(StatusReport {
        zone,
        power,
        source,
        group: Some(group),
        volume,
    })
}

fn source_name(cur: &mut Cursor<'_>) -> Option<(u8, String)> {
    cur.literal("Z0")?;
    let zone = cur.digit()?;
    cur.literal("STR+\"")?;
    // Greedy: the name runs to the last quote in the frame
    let end = cur.rest.rfind('"')?;
    Some((zone, cur.rest[..end].to_string()))
}

/// `Z0<d>PWR<ON|OFF>,SRC<d>`
fn status_prefix(cur: &mut Cursor<'_>) -> Option<(u8, bool, u8)> {
    cur.literal("Z0")?;
    let zone = cur.digit()?;
    cur.literal("PWR")?;
    let power = cur.one_of(&["ON", "OFF"])? == "ON";
    cur.literal(",SRC")?;
    let source = cur.digit()?;
    Some((zone, power, source))
}

/// `-dd` or one of the mute tokens
fn volume(cur: &mut Cursor<'_>, mute_tokens: &[&'static str]) -> Option<VolumeReport> {
    if cur.literal("-").is_some() {
        let tens = cur.digit()?;
        let ones = cur.digit()?;
        return Some(VolumeReport::Level(-((tens * 10 + ones) as i8)));
    }
    cur.one_of(mute_tokens).map(|_| VolumeReport::Muted)
}

/// Forward-only matcher over the remainder of a frame
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a str) -> Self {
        Self { rest }
    }

    fn literal(&mut self, lit: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(lit)?;
        Some(())
    }

    fn digit(&mut self) -> Option<u8> {
        let b = *self.rest.as_bytes().first()?;
        if !b.is_ascii_digit() {
            return None;
        }
        self.rest = &self.rest[1..];
        Some(b - b'0')
    }

    fn one_of<'t>(&mut self, options: &[&'t str]) -> Option<&'t str> {
        let found = *options.iter().find(|opt| self.rest.starts_with(**opt))?;
        self.rest = &self.rest[found.len()..];
        Some(found)
    }
}
