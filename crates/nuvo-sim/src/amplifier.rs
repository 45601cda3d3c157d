//! Virtual amplifier for testing
//!
//! [`VirtualAmplifier`] keeps per-zone state, decodes the `*...\r` commands
//! written to it and queues the replies a real amplifier would send. It
//! implements [`Transport`] so a zone controller can drive it directly, and
//! it can misbehave on request (stay silent, answer `#Busy`, drop the
//! terminator, or fail outright) to exercise retry paths.

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::Duration;

use nuvo_protocol::command::MAX_ATTENUATION;
use nuvo_protocol::response::BUSY;
use nuvo_protocol::{
    FrameCodec, Model, NuvoCommand, Response, StatusReport, Transport, VolumeReport, TERMINATOR,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reply sent for commands the amplifier does not understand
pub const ERROR_REPLY: &str = "#?";

/// Simulated state of one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    pub power: bool,
    pub source: u8,
    /// Attenuation magnitude, 0 loudest to 78
    pub attenuation: u8,
    pub mute: bool,
    pub treble: i8,
    pub bass: i8,
    pub group: bool,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self {
            power: false,
            source: 1,
            attenuation: 40,
            mute: false,
            treble: 0,
            bass: 0,
            group: false,
        }
    }
}

/// How the amplifier answers commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Fault {
    /// Reply normally
    #[default]
    None,
    /// Never reply
    Silent,
    /// Reply with the right text but no terminator
    Unterminated,
    /// Reply `#Busy` to the next `n` commands, then recover
    Busy(u32),
    /// Fail every read and write with an I/O error
    Disconnected,
}

/// Configuration for creating a virtual amplifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAmplifierConfig {
    /// Identifier for logging
    pub id: String,
    /// Status frame shape to answer with
    pub model: Model,
    /// Number of addressable zones
    pub zone_count: u8,
    /// Display names for sources 1 through 6
    #[serde(default)]
    pub source_names: Vec<String>,
    /// Send a source-name frame ahead of every status reply
    #[serde(default)]
    pub announce_source_names: bool,
    /// Idle time a read waits before reporting no data, in milliseconds
    #[serde(default = "default_read_delay_ms")]
    pub read_delay_ms: u64,
}

fn default_read_delay_ms() -> u64 {
    1
}

impl Default for VirtualAmplifierConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Amplifier".to_string(),
            model: Model::Concerto,
            zone_count: 8,
            source_names: Vec::new(),
            announce_source_names: false,
            read_delay_ms: default_read_delay_ms(),
        }
    }
}

/// Simulated Nuvo amplifier
#[derive(Debug)]
pub struct VirtualAmplifier {
    /// Identifier for logging
    id: String,
    model: Model,
    zones: Vec<ZoneState>,
    source_names: Vec<String>,
    announce_source_names: bool,
    read_delay: Duration,
    fault: Fault,
    /// Splits incoming bytes into commands
    inbound: FrameCodec,
    /// Reply bytes waiting to be read
    outbound: VecDeque<u8>,
    /// Commands decoded so far (for test verification)
    received_commands: Vec<NuvoCommand>,
    /// Raw frames that failed to decode
    rejected: Vec<String>,
}

impl VirtualAmplifier {
    /// Create a new virtual amplifier with all zones off
    pub fn new(id: impl Into<String>, model: Model, zone_count: u8) -> Self {
        Self::from_config(VirtualAmplifierConfig {
            id: id.into(),
            model,
            zone_count,
            ..Default::default()
        })
    }

    /// Create a virtual amplifier from configuration
    pub fn from_config(config: VirtualAmplifierConfig) -> Self {
        Self {
            id: config.id,
            model: config.model,
            zones: vec![ZoneState::default(); config.zone_count as usize],
            source_names: config.source_names,
            announce_source_names: config.announce_source_names,
            read_delay: Duration::from_millis(config.read_delay_ms),
            fault: Fault::None,
            inbound: FrameCodec::new(),
            outbound: VecDeque::new(),
            received_commands: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// State of a zone (1-based)
    pub fn zone(&self, zone: u8) -> Option<&ZoneState> {
        let index = (zone as usize).checked_sub(1)?;
        self.zones.get(index)
    }

    /// Overwrite the state of a zone (1-based); returns false if out of range
    pub fn set_zone(&mut self, zone: u8, state: ZoneState) -> bool {
        match self.zone_mut(zone) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Change how the amplifier answers
    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = fault;
    }

    /// Current fault mode
    pub fn fault(&self) -> Fault {
        self.fault
    }

    /// Queue a frame the amplifier sends on its own (terminator appended)
    pub fn push_unsolicited(&mut self, frame: &str) {
        self.queue_frame(frame);
    }

    /// Reply bytes not yet read
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Get all decoded commands (for test verification)
    pub fn received_commands(&self) -> &[NuvoCommand] {
        &self.received_commands
    }

    /// Raw frames that did not decode as commands
    pub fn rejected_frames(&self) -> &[String] {
        &self.rejected
    }

    /// Clear received commands
    pub fn clear_received(&mut self) {
        self.received_commands.clear();
        self.rejected.clear();
    }

    /// Process raw bytes written to the amplifier
    ///
    /// Returns the number of complete commands found.
    pub fn process_bytes(&mut self, data: &[u8]) -> usize {
        self.inbound.push_bytes(data);

        let mut count = 0;
        while let Some(frame) = self.inbound.next_frame() {
            count += 1;
            match NuvoCommand::parse(&frame) {
                Ok(cmd) => self.process_command(cmd),
                Err(e) => {
                    warn!("Virtual amp {} rejected {:?}: {}", self.id, frame, e);
                    self.rejected.push(frame);
                    self.reply(ERROR_REPLY.to_string());
                }
            }
        }
        count
    }

    /// Apply a decoded command and queue the reply
    pub fn process_command(&mut self, cmd: NuvoCommand) {
        debug!("Virtual amp {} processing {}", self.id, cmd);
        self.received_commands.push(cmd);

        let zone = cmd.zone();
        let Some(state) = self.zone_mut(zone) else {
            self.reply(ERROR_REPLY.to_string());
            return;
        };

        match cmd {
            NuvoCommand::Status { .. } => {}
            NuvoCommand::Power { on, .. } => state.power = on,
            NuvoCommand::Mute { on, .. } => state.mute = on,
            NuvoCommand::Volume { attenuation, .. } => {
                state.attenuation = attenuation.min(MAX_ATTENUATION)
            }
            NuvoCommand::Treble { level, .. } => state.treble = level,
            NuvoCommand::Bass { level, .. } => state.bass = level,
            NuvoCommand::Source { source, .. } => state.source = source,
        }

        if self.announce_source_names {
            if let Some(name) = self.source_name_frame(zone) {
                self.reply(name);
            }
        }
        if let Some(status) = self.status_frame(zone) {
            self.reply(status);
        }
    }

    /// Status frame for a zone, as the amplifier would report it
    pub fn status_frame(&self, zone: u8) -> Option<String> {
        let state = self.zone(zone)?;
        let report = StatusReport {
            zone,
            power: state.power,
            source: state.source,
            group: match self.model {
                Model::Concerto => None,
                Model::Simplese => Some(state.group),
            },
            volume: if state.mute {
                VolumeReport::Muted
            } else {
                VolumeReport::Level(-(state.attenuation.min(MAX_ATTENUATION) as i8))
            },
        };

        let response = match self.model {
            Model::Concerto => Response::Concerto(report),
            Model::Simplese => Response::Simplese(report),
        };
        Some(response.encode())
    }

    fn source_name_frame(&self, zone: u8) -> Option<String> {
        let state = self.zone(zone)?;
        let index = (state.source as usize).checked_sub(1)?;
        let name = self.source_names.get(index)?;
        Some(
            Response::SourceName {
                zone,
                name: name.clone(),
            }
            .encode(),
        )
    }

    fn zone_mut(&mut self, zone: u8) -> Option<&mut ZoneState> {
        let index = (zone as usize).checked_sub(1)?;
        self.zones.get_mut(index)
    }

    fn reply(&mut self, frame: String) {
        match self.fault {
            Fault::None => self.queue_frame(&frame),
            Fault::Silent | Fault::Disconnected => {}
            Fault::Unterminated => self.outbound.extend(frame.bytes()),
            Fault::Busy(remaining) => {
                self.queue_frame(BUSY);
                self.fault = if remaining > 1 {
                    Fault::Busy(remaining - 1)
                } else {
                    Fault::None
                };
            }
        }
    }

    fn queue_frame(&mut self, frame: &str) {
        self.outbound.extend(frame.bytes());
        self.outbound.push_back(TERMINATOR);
    }

    fn check_connected(&self) -> io::Result<()> {
        if self.fault == Fault::Disconnected {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("virtual amplifier {} disconnected", self.id),
            ));
        }
        Ok(())
    }
}

impl Default for VirtualAmplifier {
    fn default() -> Self {
        Self::from_config(VirtualAmplifierConfig::default())
    }
}

impl Transport for VirtualAmplifier {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.check_connected()?;
        self.process_bytes(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_connected()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.check_connected()?;
        match self.outbound.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None => {
                // Stand-in for the serial port's per-byte read timeout
                if !self.read_delay.is_zero() {
                    thread::sleep(self.read_delay);
                }
                Ok(None)
            }
        }
    }
}
