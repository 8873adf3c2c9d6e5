//! Daemon configuration.
//!
//! Every field has a default matching the usual TD5 wiring (FT232R
//! K-line cable at 10400 baud 8N1); an optional JSON file overrides
//! individual fields.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Which wake-up procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Millisecond line pulses (the default; most units accept it).
    Fast,
    /// 5-baud address transmission for units that ignore the fast pulses.
    Slow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// USB vendor id of the K-line adapter.
    pub vendor_id: u16,
    /// USB product id of the K-line adapter.
    pub product_id: u16,
    pub baud_rate: u32,
    pub init_mode: InitMode,
    /// Target address clocked out during slow init (0x33 functional).
    pub ecu_address: u8,
    /// Full handshake attempts before giving up.
    pub max_attempts: u32,
    /// Pause between failed attempts.
    pub retry_backoff_ms: u64,
    /// Breathing room granted to the ECU before each request.
    pub inter_request_delay_ms: u64,
    /// Window for a complete response to arrive.
    pub response_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_id: 0x0403,
            product_id: 0x6001,
            baud_rate: 10400,
            init_mode: InitMode::Fast,
            ecu_address: 0x33,
            max_attempts: 5,
            retry_backoff_ms: 5000,
            inter_request_delay_ms: 50,
            response_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Load a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_td5_wiring() {
        let config = Config::default();
        assert_eq!(config.vendor_id, 0x0403);
        assert_eq!(config.product_id, 0x6001);
        assert_eq!(config.baud_rate, 10400);
        assert_eq!(config.init_mode, InitMode::Fast);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"max_attempts": 3, "init_mode": "slow"}"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.init_mode, InitMode::Slow);
        assert_eq!(config.baud_rate, 10400);
        assert_eq!(config.retry_backoff_ms, 5000);
    }
}
