//! Serial transport abstraction for the K-line.
//!
//! The protocol engine owns exactly one transport and drives it from a
//! single thread. The real implementation sits on an FTDI adapter
//! (`ftdi.rs`); tests substitute a scripted mock.

// The line-property enums cover the adapter's capabilities even though the
// engine itself only ever configures 8N1.
#![allow(dead_code)]

use std::time::Duration;

use crate::error::TransportError;

/// Word size of a serial character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Byte-level access to the half-duplex K-line.
///
/// `set_manual_line_mode(true)` hands the TX pin to the caller: while
/// enabled, `write_bytes(&[0x01])` drives the line high and
/// `write_bytes(&[0x00])` drives it low. Disabling manual mode returns
/// the adapter to normal UART framing; callers reconfigure the line
/// properties afterwards.
pub trait Transport {
    fn configure(
        &mut self,
        baud_rate: u32,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), TransportError>;

    fn set_manual_line_mode(&mut self, enabled: bool) -> Result<(), TransportError>;

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Return whatever arrives within `timeout`, up to `max_len` bytes.
    /// An empty buffer means the line stayed quiet, not an error.
    fn read_bytes(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    fn purge_buffers(&mut self) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;
}
