//! Checksum-framed request/response codec.
//!
//! Every frame on the wire ends in a single additive checksum byte. The
//! K-line is half-duplex, so the tester hears its own transmission: a
//! response starts with an echo of the request that produced it, and the
//! echo must be sliced off before the payload means anything.

use crate::error::ProtocolError;

/// Marker byte at payload index 1 of a rejected request.
pub const NEGATIVE_RESPONSE: u8 = 0x7F;

/// Additive checksum: sum of all bytes except the last, modulo 256.
///
/// The last byte is the checksum slot itself and never contributes.
pub fn checksum(frame: &[u8]) -> u8 {
    let end = frame.len().saturating_sub(1);
    frame[..end].iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Copy a request template and punch a fresh checksum into its final byte.
///
/// Templates keep a placeholder in the checksum slot; the value on the
/// wire is always recomputed from the current payload bytes.
pub fn prepare(template: &[u8]) -> Vec<u8> {
    let mut request = template.to_vec();
    let last = request.len() - 1;
    request[last] = checksum(&request);
    request
}

/// Slice the echoed request off the front of a raw response.
///
/// The remainder must still hold at least a marker byte and a checksum,
/// otherwise there is no payload to validate.
pub fn strip_echo(response: &[u8], request_len: usize) -> Result<Vec<u8>, ProtocolError> {
    if response.len() < request_len + 2 {
        return Err(ProtocolError::MalformedResponse(format!(
            "{} bytes is too short for a {}-byte echo plus payload",
            response.len(),
            request_len
        )));
    }
    Ok(response[request_len..].to_vec())
}

/// Accept an echo-stripped payload only if its trailing checksum matches
/// and it does not carry the negative-response marker.
pub fn validate(payload: &[u8]) -> Result<(), ProtocolError> {
    if payload.len() < 2 {
        return Err(ProtocolError::MalformedResponse(format!(
            "{}-byte payload cannot carry a checksum",
            payload.len()
        )));
    }

    let calculated = checksum(payload);
    let received = payload[payload.len() - 1];
    if calculated != received {
        return Err(ProtocolError::ChecksumMismatch {
            calculated,
            received,
        });
    }

    if payload[1] == NEGATIVE_RESPONSE {
        return Err(ProtocolError::NegativeResponse);
    }

    Ok(())
}
