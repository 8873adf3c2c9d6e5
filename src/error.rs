//! Protocol and transport error types.

use thiserror::Error;

/// Errors raised by the serial transport layer.
///
/// Open and configure failures are fatal at startup; I/O failures surface
/// through the protocol engine as failed exchanges.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device open failed: {0}")]
    Open(String),

    #[error("device configure failed: {0}")]
    Configure(String),

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Errors raised by the K-line protocol engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response never completed within the read window.
    #[error("no complete response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The trailing checksum byte disagrees with the additive sum.
    #[error("checksum mismatch: calculated 0x{calculated:02X}, received 0x{received:02X}")]
    ChecksumMismatch { calculated: u8, received: u8 },

    /// The ECU rejected the request (0x7F marker in the payload).
    #[error("negative response from ECU")]
    NegativeResponse,

    /// Response too short to carry the echoed request plus a payload.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The wake-up synchronization pattern never arrived or did not match.
    /// Hard failure: the line state is unknown, so the session is torn down.
    #[error("wake-up synchronization failed: {0}")]
    SyncFailed(String),

    /// The full wake-up-through-key-exchange sequence failed every attempt.
    #[error("connection failed after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// Convenience alias for protocol results.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
