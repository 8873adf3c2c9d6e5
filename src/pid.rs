//! Fixed PID catalogue and telemetry decoding.
//!
//! Each diagnostic service is a request template plus the minimum number
//! of response bytes (echo included) that must arrive before the
//! exchange counts as complete. Templates carry a placeholder checksum
//! that is recomputed on every transmission.

use crate::error::ProtocolError;
use crate::security;

/// Immutable descriptor for one diagnostic service.
#[derive(Debug, Clone)]
pub struct PidDefinition {
    pub name: &'static str,
    pub request: Vec<u8>,
    pub expected_len: usize,
}

impl PidDefinition {
    fn new(name: &'static str, request: &[u8], expected_len: usize) -> Self {
        Self {
            name,
            request: request.to_vec(),
            expected_len,
        }
    }
}

/// The services the engine speaks, built once at startup.
///
/// Only the key-return request ever changes between attempts, and only
/// in its two key bytes; `send_key` hands out a patched copy so the
/// stored template stays pristine.
pub struct PidTable {
    pub init: PidDefinition,
    pub start_diagnostics: PidDefinition,
    pub request_seed: PidDefinition,
    send_key: PidDefinition,
    pub battery_voltage: PidDefinition,
    pub engine_rpm: PidDefinition,
    pub vehicle_speed: PidDefinition,
}

impl PidTable {
    pub fn new() -> Self {
        Self {
            init: PidDefinition::new("init", &[0x81, 0x13, 0xF7, 0x81, 0x0C], 7),
            start_diagnostics: PidDefinition::new("start-diagnostics", &[0x02, 0x10, 0xA0, 0xB2], 3),
            request_seed: PidDefinition::new("request-seed", &[0x02, 0x27, 0x01, 0x2A], 6),
            send_key: PidDefinition::new("send-key", &[0x04, 0x27, 0x02, 0x00, 0x00, 0x00], 4),
            battery_voltage: PidDefinition::new("battery-voltage", &[0x02, 0x21, 0x10, 0x00], 8),
            engine_rpm: PidDefinition::new("engine-rpm", &[0x02, 0x21, 0x09, 0x00], 6),
            vehicle_speed: PidDefinition::new("vehicle-speed", &[0x02, 0x21, 0x0D, 0x00], 5),
        }
    }

    /// Key-return request carrying `key` in bytes 3..5.
    pub fn send_key(&self, key: u16) -> PidDefinition {
        let (hi, lo) = security::key_bytes(key);
        let mut def = self.send_key.clone();
        def.request[3] = hi;
        def.request[4] = lo;
        def
    }
}

impl Default for PidTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Telemetry channels polled once the session is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    BatteryVoltage,
    EngineRpm,
    VehicleSpeed,
}

impl Channel {
    /// Fixed round order for one polling iteration.
    pub const ROUND: [Channel; 3] = [
        Channel::BatteryVoltage,
        Channel::EngineRpm,
        Channel::VehicleSpeed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::BatteryVoltage => "battery_voltage",
            Channel::EngineRpm => "engine_rpm",
            Channel::VehicleSpeed => "vehicle_speed",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::BatteryVoltage => "V",
            Channel::EngineRpm => "rpm",
            Channel::VehicleSpeed => "km/h",
        }
    }

    pub fn definition(self, table: &PidTable) -> &PidDefinition {
        match self {
            Channel::BatteryVoltage => &table.battery_voltage,
            Channel::EngineRpm => &table.engine_rpm,
            Channel::VehicleSpeed => &table.vehicle_speed,
        }
    }

    /// Decode an echo-stripped, validated payload into a numeric value.
    ///
    /// Value bytes sit immediately after the leading payload byte,
    /// matching the captured battery-voltage exchange.
    pub fn decode(self, payload: &[u8]) -> Result<f64, ProtocolError> {
        match self {
            Channel::BatteryVoltage => be_u16_at(payload, 1).map(|raw| f64::from(raw) / 1000.0),
            Channel::EngineRpm => be_u16_at(payload, 1).map(f64::from),
            Channel::VehicleSpeed => payload
                .get(1)
                .copied()
                .map(f64::from)
                .ok_or_else(|| short_payload(self.name(), payload.len())),
        }
    }
}

fn be_u16_at(payload: &[u8], index: usize) -> Result<u16, ProtocolError> {
    if payload.len() < index + 2 {
        return Err(short_payload("value", payload.len()));
    }
    Ok(u16::from_be_bytes([payload[index], payload[index + 1]]))
}

fn short_payload(what: &str, len: usize) -> ProtocolError {
    ProtocolError::MalformedResponse(format!("{len}-byte payload too short for {what} bytes"))
}
