//! Zone controller
//!
//! Owns the link to one amplifier and serializes every request/response
//! cycle behind a single lock. Public operations take the lock once and run
//! on [`Link`] methods that assume it is held, so composite operations like
//! [`ZoneController::restore_zone`] stay atomic without a re-entrant mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use nuvo_protocol::{
    parse_frame, parse_response, EncodeCommand, FrameRead, FrameReader, NuvoCommand, Response,
    Transport, ZoneStatus,
};
use tracing::{debug, info, trace, warn};

use crate::config::ControllerConfig;
use crate::error::{ControlError, ExchangeError};
use crate::serial::{SerialSettings, SerialTransport};

/// Highest zone a status reply can name (the reply carries one digit)
pub const MAX_STATUS_ZONE: u8 = 9;

/// Transport plus the bytes read from it that have not formed a frame yet
struct Link<T> {
    transport: T,
    reader: FrameReader,
}

/// Controller for one Nuvo amplifier
pub struct ZoneController<T: Transport> {
    link: Mutex<Link<T>>,
    config: ControllerConfig,
}

impl ZoneController<SerialTransport> {
    /// Open a serial port and wrap it in a controller
    pub fn open(settings: &SerialSettings, config: ControllerConfig) -> Result<Self, ControlError> {
        let transport = SerialTransport::open(settings)?;
        info!("Connected to amplifier on {}", settings.port);
        Ok(Self::with_config(transport, config))
    }
}

impl<T: Transport> ZoneController<T> {
    /// Wrap a transport with default timing
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ControllerConfig::default())
    }

    /// Wrap a transport with explicit timing
    pub fn with_config(transport: T, config: ControllerConfig) -> Self {
        Self {
            link: Mutex::new(Link {
                transport,
                reader: FrameReader::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Give the transport back, dropping any partially read frame
    pub fn into_transport(self) -> T {
        self.link
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .transport
    }

    /// Run `f` against the transport while holding the controller lock
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock().transport)
    }

    /// Query the current state of a zone.
    ///
    /// Returns `None` once every attempt has timed out, failed on the link,
    /// or produced a frame that is not this zone's status.
    pub fn zone_status(&self, zone: u8) -> Option<ZoneStatus> {
        let mut link = self.lock();
        link.query_status(zone, &self.config)
    }

    pub fn set_power(&self, zone: u8, on: bool) {
        self.execute(NuvoCommand::power(zone, on));
    }

    pub fn set_mute(&self, zone: u8, on: bool) {
        self.execute(NuvoCommand::mute(zone, on));
    }

    /// Set volume in dB; the sign is dropped and the magnitude rounded
    pub fn set_volume(&self, zone: u8, volume: f64) {
        self.execute(NuvoCommand::volume(zone, volume));
    }

    pub fn set_treble(&self, zone: u8, treble: i32) {
        self.execute(NuvoCommand::treble(zone, treble));
    }

    pub fn set_bass(&self, zone: u8, bass: i32) {
        self.execute(NuvoCommand::bass(zone, bass));
    }

    pub fn set_source(&self, zone: u8, source: i32) {
        self.execute(NuvoCommand::source(zone, source));
    }

    /// Send one command and discard whatever the amplifier answers
    pub fn execute(&self, command: NuvoCommand) {
        let mut link = self.lock();
        link.fire(command, self.config.response_timeout);
    }

    /// Re-apply a saved snapshot: power, mute, volume, then source.
    ///
    /// Tone settings are not restored. The whole sequence runs under one
    /// lock acquisition, so no other request can interleave.
    pub fn restore_zone(&self, status: &ZoneStatus) {
        let zone = status.zone;
        let timeout = self.config.response_timeout;
        info!("Restoring zone {}", zone);

        let mut link = self.lock();
        link.fire(NuvoCommand::power(zone, status.power), timeout);
        link.fire(NuvoCommand::mute(zone, status.mute), timeout);
        link.fire(NuvoCommand::volume(zone, f64::from(status.volume)), timeout);

        match status.source_number() {
            Some(source) => link.fire(NuvoCommand::source(zone, i32::from(source)), timeout),
            None => warn!(
                "Not restoring source for zone {}: {:?} is not a source number",
                zone, status.source
            ),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Link<T>> {
        // The link holds only a transport and a byte buffer, both usable
        // after a panic elsewhere.
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> std::fmt::Debug for ZoneController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Link<T> {
    /// Discard frames the amplifier sent on its own since the last request
    fn drain_stale(&mut self, limit: Duration) {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reader.read_frame(&mut self.transport, remaining, false) {
                Ok(FrameRead::Frame(frame)) => debug!("Discarding stale frame {:?}", frame),
                Ok(FrameRead::Empty) => return,
                Ok(FrameRead::TimedOut) => {
                    debug!("Link still busy after draining for {:?}", limit);
                    return;
                }
                Err(e) => {
                    warn!("Error draining link: {}", e);
                    return;
                }
            }
        }
    }

    fn send(&mut self, command: &NuvoCommand) -> std::io::Result<()> {
        info!("Sending {}", command);
        self.transport.write(&command.encode())?;
        self.transport.flush()
    }

    /// Send a state-changing command once and read one reply, if any
    fn fire(&mut self, command: NuvoCommand, timeout: Duration) {
        self.drain_stale(timeout);

        if let Err(e) = self.send(&command) {
            warn!("Failed to send {}: {}", command, e);
            return;
        }

        match self.reader.read_frame(&mut self.transport, timeout, true) {
            Ok(FrameRead::Frame(frame)) => match parse_response(&frame) {
                Some(response) => debug!("{} acknowledged: {:?}", command, response),
                None => debug!("{} answered with {:?}", command, frame),
            },
            Ok(_) => {
                debug!("No reply to {} within {:?}", command, timeout);
                self.discard_partial();
            }
            Err(e) => warn!("Error reading reply to {}: {}", command, e),
        }
    }

    /// Drop bytes of a reply that never got its terminator, so they cannot
    /// prefix the next frame
    fn discard_partial(&mut self) {
        if !self.reader.pending().is_empty() {
            debug!(
                "Discarding {} unterminated bytes",
                self.reader.pending().len()
            );
            self.reader.clear();
        }
    }

    fn query_status(&mut self, zone: u8, config: &ControllerConfig) -> Option<ZoneStatus> {
        if zone > MAX_STATUS_ZONE {
            warn!(
                "Zone {} cannot be queried: replies only carry zones up to {}",
                zone, MAX_STATUS_ZONE
            );
            return None;
        }

        let attempts = config.attempts();
        for attempt in 1..=attempts {
            match self.status_attempt(zone, config.response_timeout) {
                Ok(status) => return Some(status),
                Err(ExchangeError::Transport(e)) => {
                    warn!("Status attempt {}/{} for zone {}: {}", attempt, attempts, zone, e)
                }
                Err(e) => {
                    debug!("Status attempt {}/{} for zone {}: {}", attempt, attempts, zone, e)
                }
            }

            if attempt < attempts && !config.retry_delay.is_zero() {
                thread::sleep(config.retry_delay);
            }
        }

        warn!("No status for zone {} after {} attempts", zone, attempts);
        None
    }

    /// One drain, send, await, parse cycle for a status query
    fn status_attempt(&mut self, zone: u8, timeout: Duration) -> Result<ZoneStatus, ExchangeError> {
        self.drain_stale(timeout);
        self.send(&NuvoCommand::status(zone))?;

        let deadline = Instant::now() + timeout;
        let mut source_name = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match self.reader.read_frame(&mut self.transport, remaining, true)? {
                FrameRead::Frame(frame) => frame,
                FrameRead::Empty | FrameRead::TimedOut => {
                    self.discard_partial();
                    return Err(ExchangeError::Timeout(timeout));
                }
            };

            match parse_frame(&frame)? {
                Response::SourceName { zone: z, name } if z == zone => {
                    trace!("Source name for zone {}: {:?}", zone, name);
                    source_name = Some(name);
                }
                Response::SourceName { .. } => return Err(ExchangeError::Unexpected(frame)),
                Response::Concerto(report) | Response::Simplese(report) => {
                    if report.zone != zone {
                        return Err(ExchangeError::WrongZone {
                            expected: zone,
                            got: report.zone,
                        });
                    }
                    let status = ZoneStatus::from_report(&report);
                    return Ok(match source_name {
                        Some(name) => status.with_source_name(name),
                        None => status,
                    });
                }
            }
        }
    }
}
