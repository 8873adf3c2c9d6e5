//! Diagnostic session state machine.
//!
//! Owns the transport, the PID catalogue, and the checksum-framed
//! request/response exchange used by the handshake and the poller
//! alike. `connect` drives the full wake-up-through-key-exchange ladder
//! with bounded retry; partial progress never survives a failed
//! attempt.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{Config, InitMode};
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame;
use crate::kline;
use crate::pid::{PidDefinition, PidTable};
use crate::security;
use crate::transport::Transport;

/// Largest response buffered for a single request.
pub const READ_BUFFER_SIZE: usize = 127;

/// Per-poll slice of the response read window.
const READ_POLL_WINDOW: Duration = Duration::from_millis(20);

/// Where the engine is in the connect ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    WakingUp,
    AwaitingDiagnosticsAck,
    AwaitingSeed,
    AwaitingKeyAck,
    Connected,
    Failed,
}

/// One diagnostic session over an exclusively-owned transport.
pub struct Td5Session<T: Transport> {
    transport: T,
    config: Config,
    pids: PidTable,
    state: SessionState,
    /// Last validated, echo-stripped payload.
    last_response: Vec<u8>,
}

impl<T: Transport> Td5Session<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            pids: PidTable::new(),
            state: SessionState::Disconnected,
            last_response: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pids(&self) -> &PidTable {
        &self.pids
    }

    /// Last validated payload, for inspection after an exchange.
    #[cfg(test)]
    pub fn last_response(&self) -> &[u8] {
        &self.last_response
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the full handshake, retrying whole attempts until the limit
    /// is spent. Exhaustion closes the transport and is a hard stop.
    pub fn connect(&mut self) -> ProtocolResult<()> {
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            info!("Connection attempt {}/{}", attempt, attempts);
            match self.try_connect() {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    info!("ECU connected");
                    return Ok(());
                }
                Err(err @ ProtocolError::SyncFailed(_)) => {
                    // Unknown line state; tear down instead of retrying.
                    self.state = SessionState::Failed;
                    self.transport.close()?;
                    return Err(err);
                }
                Err(err) => {
                    warn!("Attempt {} failed: {}", attempt, err);
                    self.state = SessionState::Disconnected;
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
                    }
                }
            }
        }

        self.state = SessionState::Failed;
        self.transport.close()?;
        Err(ProtocolError::AttemptsExhausted { attempts })
    }

    /// One attempt: wake-up, diagnostics start, seed, key.
    fn try_connect(&mut self) -> ProtocolResult<()> {
        self.state = SessionState::WakingUp;
        match self.config.init_mode {
            InitMode::Fast => kline::fast_init(&mut self.transport, self.config.baud_rate)?,
            InitMode::Slow => kline::slow_init(
                &mut self.transport,
                self.config.ecu_address,
                self.config.baud_rate,
            )?,
        }

        let init = self.pids.init.clone();
        self.exchange(&init)?;
        self.state = SessionState::AwaitingDiagnosticsAck;

        let start_diagnostics = self.pids.start_diagnostics.clone();
        self.exchange(&start_diagnostics)?;
        self.state = SessionState::AwaitingSeed;

        let request_seed = self.pids.request_seed.clone();
        let reply = self.exchange(&request_seed)?;
        let seed = extract_seed(&reply)?;
        self.state = SessionState::AwaitingKeyAck;

        let key = security::derive_key(seed);
        debug!("Seed 0x{:04X} answered with key 0x{:04X}", seed, key);

        let send_key = self.pids.send_key(key);
        self.exchange(&send_key)?;
        Ok(())
    }

    /// Request/response exchange shared by the handshake and the poller.
    ///
    /// The checksum is recomputed from the template immediately before
    /// transmission; the echoed request is stripped and the remainder
    /// validated before anything is returned.
    pub fn exchange(&mut self, pid: &PidDefinition) -> ProtocolResult<Vec<u8>> {
        let request = frame::prepare(&pid.request);

        // Give the ECU room to finish digesting the previous request.
        thread::sleep(Duration::from_millis(self.config.inter_request_delay_ms));

        debug!("TX: {:02X?}", request);
        self.transport.write_bytes(&request)?;

        let raw = self.read_response(pid.expected_len)?;
        debug!("RX: {:02X?}", raw);

        let payload = frame::strip_echo(&raw, request.len())?;
        frame::validate(&payload)?;

        self.last_response = payload;
        Ok(self.last_response.clone())
    }

    /// Accumulate response bytes until at least `expected_len` arrived
    /// and the line went quiet, the buffer cap was hit, or the window
    /// expired.
    fn read_response(&mut self, expected_len: usize) -> ProtocolResult<Vec<u8>> {
        let timeout_ms = self.config.response_timeout_ms;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let now = Instant::now();
            let poll = if now >= deadline {
                Duration::ZERO
            } else {
                (deadline - now).min(READ_POLL_WINDOW)
            };

            let chunk = self.transport.read_bytes(READ_BUFFER_SIZE - buf.len(), poll)?;
            let quiet = chunk.is_empty();
            buf.extend_from_slice(&chunk);

            if buf.len() >= READ_BUFFER_SIZE {
                break;
            }
            if buf.len() >= expected_len && quiet {
                break;
            }
            if Instant::now() >= deadline {
                if buf.len() >= expected_len {
                    break;
                }
                return Err(ProtocolError::Timeout { timeout_ms });
            }
        }

        Ok(buf)
    }

    /// Normal teardown: close the line and drop back to `Disconnected`.
    pub fn close(&mut self) -> ProtocolResult<()> {
        self.transport.close()?;
        self.state = SessionState::Disconnected;
        Ok(())
    }
}

/// Seed bytes sit at payload offsets 3..5 of the security-access reply.
fn extract_seed(payload: &[u8]) -> ProtocolResult<u16> {
    if payload.len() < 5 {
        return Err(ProtocolError::MalformedResponse(format!(
            "{}-byte seed reply carries no seed",
            payload.len()
        )));
    }
    Ok(u16::from_be_bytes([payload[3], payload[4]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn test_config() -> Config {
        Config {
            inter_request_delay_ms: 1,
            response_timeout_ms: 20,
            retry_backoff_ms: 1,
            max_attempts: 2,
            ..Config::default()
        }
    }

    fn session_with(responses: Vec<Vec<u8>>) -> Td5Session<MockTransport> {
        Td5Session::new(MockTransport::with_responses(responses), test_config())
    }

    #[test]
    fn exchange_strips_echo_and_validates() {
        let mut session = session_with(vec![vec![
            0x02, 0x27, 0x01, 0x2A, // echo
            0x04, 0x67, 0x01, 0x52, 0x25, 0xE3,
        ]]);

        let request_seed = session.pids().request_seed.clone();
        let payload = session.exchange(&request_seed).unwrap();
        assert_eq!(payload, vec![0x04, 0x67, 0x01, 0x52, 0x25, 0xE3]);
        assert_eq!(session.last_response(), payload.as_slice());
    }

    #[test]
    fn exchange_times_out_on_silence() {
        let mut session = session_with(Vec::new());
        let init = session.pids().init.clone();
        assert!(matches!(
            session.exchange(&init),
            Err(ProtocolError::Timeout { timeout_ms: 20 })
        ));
    }

    #[test]
    fn exchange_rejects_corrupt_checksum() {
        let mut session = session_with(vec![vec![
            0x02, 0x27, 0x01, 0x2A, 0x04, 0x67, 0x01, 0x53, 0x25, 0xE3,
        ]]);
        let request_seed = session.pids().request_seed.clone();
        assert!(matches!(
            session.exchange(&request_seed),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn exchange_rejects_negative_response() {
        // Stripped payload [03 7F 10 92] has a valid checksum.
        let mut session = session_with(vec![vec![
            0x02, 0x10, 0xA0, 0xB2, 0x03, 0x7F, 0x10, 0x92,
        ]]);
        let start = session.pids().start_diagnostics.clone();
        assert!(matches!(
            session.exchange(&start),
            Err(ProtocolError::NegativeResponse)
        ));
    }

    #[test]
    fn seed_extraction_matches_documented_trace() {
        assert_eq!(
            extract_seed(&[0x04, 0x67, 0x01, 0x52, 0x25, 0xE3]).unwrap(),
            0x5225
        );
        assert!(extract_seed(&[0x04, 0x67, 0x01]).is_err());
    }
}
