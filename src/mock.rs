//! Scripted mock transport for tests.
//!
//! Models the half-duplex line: a queued response chunk is only handed
//! out after the engine has written something (the ECU never speaks
//! unprompted), and each chunk is delivered at most once per write so a
//! follow-up quiet poll sees an empty line. Every call is recorded for
//! assertions.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{DataBits, Parity, StopBits, Transport};

/// Everything the engine did to the line, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Configure { baud_rate: u32 },
    ManualLineMode(bool),
    Write(Vec<u8>),
    Purge,
    Close,
}

#[derive(Default)]
pub struct MockTransport {
    /// Chunks handed out by successive armed reads, FIFO.
    responses: VecDeque<Vec<u8>>,
    pub events: Vec<MockEvent>,
    armed: bool,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I: IntoIterator<Item = Vec<u8>>>(responses: I) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn write_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MockEvent::Write(_)))
            .count()
    }

    /// Frames passed to `write_bytes`, ignoring single-byte line toggles
    /// and init acknowledgements.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(bytes) if bytes.len() > 1 => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn configure(
        &mut self,
        baud_rate: u32,
        _data_bits: DataBits,
        _stop_bits: StopBits,
        _parity: Parity,
    ) -> Result<(), TransportError> {
        self.events.push(MockEvent::Configure { baud_rate });
        Ok(())
    }

    fn set_manual_line_mode(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.events.push(MockEvent::ManualLineMode(enabled));
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Io("write on closed transport".into()));
        }
        self.events.push(MockEvent::Write(buf.to_vec()));
        self.armed = true;
        Ok(())
    }

    fn read_bytes(&mut self, max_len: usize, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if self.armed {
            self.armed = false;
            if let Some(mut bytes) = self.responses.pop_front() {
                bytes.truncate(max_len);
                return Ok(bytes);
            }
        }
        Ok(Vec::new())
    }

    fn purge_buffers(&mut self) -> Result<(), TransportError> {
        self.events.push(MockEvent::Purge);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.events.push(MockEvent::Close);
        Ok(())
    }
}
