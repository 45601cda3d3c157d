//! Carriage-return frame codec
//!
//! The amplifier has no message boundaries other than a single `\r` after
//! every reply. [`FrameCodec`] accumulates raw bytes and hands out one frame
//! (the text before a terminator) at a time, keeping whatever follows the
//! terminator for the next call. [`FrameReader`] drives the codec from a
//! [`Transport`], one byte per read.

use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::transport::Transport;

/// Frame terminator (carriage return)
pub const TERMINATOR: u8 = b'\r';

/// Longest run of bytes kept while waiting for a terminator
const MAX_FRAME_LEN: usize = 1024;

/// Streaming frame codec
#[derive(Debug, Default)]
pub struct FrameCodec {
    buffer: Vec<u8>,
}

impl FrameCodec {
    /// Create a new frame codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Line noise without a terminator must not grow the buffer forever
        if self.buffer.len() > MAX_FRAME_LEN && !self.buffer.contains(&TERMINATOR) {
            let excess = self.buffer.len() - MAX_FRAME_LEN;
            warn!("Discarding {} unterminated bytes", excess);
            self.buffer.drain(..excess);
        }
    }

    /// Try to extract the next complete frame from the buffer
    pub fn next_frame(&mut self) -> Option<String> {
        let term_pos = self.buffer.iter().position(|&b| b == TERMINATOR)?;

        let raw: Vec<u8> = self.buffer.drain(..=term_pos).collect();
        Some(String::from_utf8_lossy(&raw[..term_pos]).into_owned())
    }

    /// Bytes received after the last terminator
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Outcome of a single [`FrameReader::read_frame`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete frame, terminator stripped
    Frame(String),
    /// Non-blocking read found nothing waiting on the link
    Empty,
    /// Deadline passed before a terminator arrived
    TimedOut,
}

/// Pulls frames off a [`Transport`] one byte at a time
#[derive(Debug, Default)]
pub struct FrameReader {
    codec: FrameCodec,
}

impl FrameReader {
    /// Create a reader with an empty buffer
    pub fn new() -> Self {
        Self {
            codec: FrameCodec::new(),
        }
    }

    /// Read the next frame.
    ///
    /// With `block_if_empty` unset the call returns [`FrameRead::Empty`] as
    /// soon as the transport has nothing to give, which is how stale
    /// unsolicited frames are drained before a new command. Otherwise it
    /// keeps reading until a terminator arrives or `timeout` elapses. Bytes
    /// read without a terminator stay buffered for the next call either way.
    pub fn read_frame<T>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
        block_if_empty: bool,
    ) -> io::Result<FrameRead>
    where
        T: Transport + ?Sized,
    {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.codec.next_frame() {
                debug!("Received: {:?}", frame);
                return Ok(FrameRead::Frame(frame));
            }

            match transport.read_byte()? {
                Some(byte) => self.codec.push_bytes(&[byte]),
                None if !block_if_empty => return Ok(FrameRead::Empty),
                None => trace!("Awaiting response - no data received"),
            }

            if Instant::now() >= deadline {
                if !self.codec.pending().is_empty() {
                    debug!(
                        "Timed out with {} bytes but no terminator",
                        self.codec.pending().len()
                    );
                }
                return Ok(FrameRead::TimedOut);
            }
        }
    }

    /// Bytes received after the last complete frame
    pub fn pending(&self) -> &[u8] {
        self.codec.pending()
    }

    /// Drop any partially received frame
    pub fn clear(&mut self) {
        self.codec.clear();
    }
}
