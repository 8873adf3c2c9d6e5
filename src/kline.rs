//! K-line wake-up procedures.
//!
//! Brings the ECU's diagnostic mode online by toggling the line at exact
//! intervals (fast init) or clocking a target address out at 5 baud and
//! exchanging synchronization bytes (slow init). Both variants leave the
//! adapter back in normal UART framing with purged buffers, ready for
//! checksum-framed exchange. The timing windows matter: drifting outside
//! them desynchronizes the ECU's edge detection rather than producing an
//! error.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ProtocolError, TransportError};
use crate::transport::{DataBits, Parity, StopBits, Transport};

const LINE_HIGH: [u8; 1] = [0x01];
const LINE_LOW: [u8; 1] = [0x00];

/// 5-baud bit cell width.
const SLOW_BIT_MS: u64 = 200;
/// Window for the sync/key-byte reply after the 5-baud address.
const SLOW_SYNC_TIMEOUT_MS: u64 = 340;
/// Pause before each synchronization acknowledgement byte.
const ACK_DELAY_MS: u64 = 25;

const SYNC_BYTE: u8 = 0x55;
const KEY_BYTE_2: u8 = 0x8F;

fn pause(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

/// Hand the line back to the UART and flush whatever the wake-up left
/// in the buffers.
fn restore_uart<T: Transport>(transport: &mut T, baud_rate: u32) -> Result<(), TransportError> {
    transport.set_manual_line_mode(false)?;
    transport.configure(baud_rate, DataBits::Eight, StopBits::One, Parity::None)?;
    transport.purge_buffers()
}

/// Fast init: HIGH 500 ms, LOW 25 ms, HIGH 100 ms.
///
/// Idempotent per attempt; no state survives besides the line level.
pub fn fast_init<T: Transport>(transport: &mut T, baud_rate: u32) -> Result<(), ProtocolError> {
    info!("Fast init: pulsing the line");
    transport.set_manual_line_mode(true)?;

    transport.write_bytes(&LINE_HIGH)?;
    pause(500);

    transport.write_bytes(&LINE_LOW)?;
    pause(25);

    transport.write_bytes(&LINE_HIGH)?;
    pause(100);

    restore_uart(transport, baud_rate)?;
    Ok(())
}

/// Slow init: clock `address` out at 5 baud, then exchange sync and key
/// bytes with the ECU.
///
/// The ECU answers with `[0x55, kb1, 0x8F]`; the tester acknowledges
/// with the inverted second key byte and the inverted address. Anything
/// else means the line state is unknown and the session must be torn
/// down rather than retried.
pub fn slow_init<T: Transport>(
    transport: &mut T,
    address: u8,
    baud_rate: u32,
) -> Result<(), ProtocolError> {
    info!("Slow init: sending address 0x{:02X} at 5 baud", address);
    transport.set_manual_line_mode(true)?;

    transport.write_bytes(&LINE_HIGH)?;
    pause(300);

    // Start bit.
    transport.write_bytes(&LINE_LOW)?;
    pause(SLOW_BIT_MS);

    // Eight data bits, LSB first.
    for bit in 0..8 {
        if (address >> bit) & 0x01 == 1 {
            transport.write_bytes(&LINE_HIGH)?;
        } else {
            transport.write_bytes(&LINE_LOW)?;
        }
        pause(SLOW_BIT_MS);
    }

    // Stop bit.
    transport.write_bytes(&LINE_HIGH)?;
    pause(SLOW_BIT_MS);

    restore_uart(transport, baud_rate)?;

    let reply = read_exact(transport, 3, Duration::from_millis(SLOW_SYNC_TIMEOUT_MS))?;

    if reply[0] != SYNC_BYTE || reply[2] != KEY_BYTE_2 {
        warn!("Slow init sync mismatch: {:02X?}", reply);
        return Err(ProtocolError::SyncFailed(format!(
            "expected [{SYNC_BYTE:02X} kb1 {KEY_BYTE_2:02X}], got {reply:02X?}"
        )));
    }
    debug!(
        "Sync 0x55 received, key bytes {:02X} {:02X}",
        reply[1], reply[2]
    );

    pause(ACK_DELAY_MS);
    transport.write_bytes(&[!reply[2]])?;

    pause(ACK_DELAY_MS);
    transport.write_bytes(&[!address])?;

    info!("Slow init complete");
    Ok(())
}

fn read_exact<T: Transport>(
    transport: &mut T,
    want: usize,
    timeout: Duration,
) -> Result<Vec<u8>, ProtocolError> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::with_capacity(want);

    while buf.len() < want {
        let now = Instant::now();
        if now >= deadline {
            return Err(ProtocolError::SyncFailed(format!(
                "{} of {} sync bytes within {}ms",
                buf.len(),
                want,
                timeout.as_millis()
            )));
        }
        let chunk = transport.read_bytes(want - buf.len(), deadline - now)?;
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEvent, MockTransport};

    #[test]
    fn fast_init_pulse_sequence() {
        let mut transport = MockTransport::new();
        fast_init(&mut transport, 10400).unwrap();

        assert_eq!(
            transport.events,
            vec![
                MockEvent::ManualLineMode(true),
                MockEvent::Write(vec![0x01]),
                MockEvent::Write(vec![0x00]),
                MockEvent::Write(vec![0x01]),
                MockEvent::ManualLineMode(false),
                MockEvent::Configure { baud_rate: 10400 },
                MockEvent::Purge,
            ]
        );
    }

    #[test]
    fn slow_init_clocks_address_and_acknowledges() {
        let mut transport = MockTransport::with_responses([vec![0x55, 0xEF, 0x8F]]);
        slow_init(&mut transport, 0x33, 10400).unwrap();

        // 0x33 LSB-first: 1 1 0 0 1 1 0 0.
        let levels: Vec<u8> = transport
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(bytes) if bytes.len() == 1 => Some(bytes[0]),
                _ => None,
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                0x01, // idle high
                0x00, // start bit
                0x01, 0x01, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, // address
                0x01, // stop bit
                !0x8F, // inverted key byte 2
                !0x33, // inverted address
            ]
        );
    }

    #[test]
    fn slow_init_sync_mismatch_is_fatal() {
        // Wrong second key byte.
        let mut transport = MockTransport::with_responses([vec![0x55, 0xEF, 0x90]]);
        let err = slow_init(&mut transport, 0x33, 10400).unwrap_err();
        assert!(matches!(err, ProtocolError::SyncFailed(_)));
    }

    #[test]
    fn slow_init_times_out_without_a_reply() {
        let mut transport = MockTransport::new();
        let err = slow_init(&mut transport, 0x33, 10400).unwrap_err();
        assert!(matches!(err, ProtocolError::SyncFailed(_)));
    }
}
