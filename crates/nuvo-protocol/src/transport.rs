//! Byte-level link to the amplifier.
//!
//! The [`Transport`] trait abstracts over the physical connection so the
//! frame reader and zone controller can run against a real serial port or an
//! in-process simulator.

use std::io;

/// Blocking byte transport with a per-byte read timeout.
///
/// The timeout itself belongs to the implementation (a serial port's read
/// timeout, a simulator's idle delay); callers only see whether a byte
/// arrived.
pub trait Transport: Send {
    /// Write all bytes to the link.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push any buffered output onto the wire.
    fn flush(&mut self) -> io::Result<()>;

    /// Read a single byte, returning `Ok(None)` if nothing arrived before the
    /// transport's read timeout.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}
