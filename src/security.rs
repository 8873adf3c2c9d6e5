//! Seed-key security access derivation.
//!
//! The ECU unlocks diagnostic services only after the tester answers its
//! 16-bit seed with a matching key. The transform is a short
//! shift-register walk whose iteration count also depends on the seed;
//! it has to match the ECU firmware bit-for-bit or the key exchange
//! fails silently.

/// Derive the security-access key for a seed.
///
/// The iteration count is 1 plus a 4-bit number assembled from four seed
/// taps, so the loop runs between 1 and 16 times. Each pass rotates the
/// value right through a parity feedback bit and then forces bit 0
/// depending on bits 3 and 13 of the pre-shift value.
pub fn derive_key(seed: u16) -> u16 {
    let count = ((seed >> 12) & 0x8) + ((seed >> 5) & 0x4) + ((seed >> 3) & 0x2) + (seed & 0x1) + 1;

    let mut value = seed;
    for _ in 0..count {
        let tap = ((value >> 1) + (value >> 2) + (value >> 8) + (value >> 9)) & 1;
        let rotated = (value >> 1) | (tap << 15);
        value = if value & 0x0008 != 0 && value & 0x2000 != 0 {
            rotated & !1
        } else {
            rotated | 1
        };
    }
    value
}

/// Split a key into the (high, low) bytes sent in the key-return frame.
pub fn key_bytes(key: u16) -> (u8, u8) {
    ((key >> 8) as u8, (key & 0xFF) as u8)
}
