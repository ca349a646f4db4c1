//! Runtime configuration: serial line settings, gateway tuning knobs and the
//! registered-unit snapshot.
//!
//! Everything here is plain serde data. The crate deliberately does not own
//! any storage; hosts persist the JSON blobs wherever they like and hand them
//! back on startup. Line settings take effect when the transport is next
//! opened.

use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;

/// Default seconds between status poll sweeps.
pub const DEFAULT_POLL_INTERVAL_S: u64 = 10;

/// Default minimum gap between two transport operations, in milliseconds.
pub const DEFAULT_THROTTLE_MS: u64 = 25;

/// Default seconds of post-write read suppression and holding-shadow trust.
pub const DEFAULT_CACHE_WRITE_S: u64 = 35;

/// Default seconds an error read stays cached.
pub const DEFAULT_CACHE_ERROR_S: u64 = 10;

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityMode {
    None,
    Even,
    Odd,
}

/// Modbus-RTU line settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtuConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    pub baud_rate: u32,
    /// 7 or 8.
    pub data_bits: u8,
    /// 1 or 2.
    pub stop_bits: u8,
    pub parity: ParityMode,
    /// Modbus slave id of the adapter.
    pub slave_id: u8,
    /// Per-exchange deadline for both transmit completion and receive.
    pub timeout_ms: u64,
}

impl Default for RtuConfig {
    fn default() -> Self {
        // The adapter ships talking 9600 8E1.
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: ParityMode::Even,
            slave_id: 1,
            timeout_ms: 1200,
        }
    }
}

impl RtuConfig {
    pub fn serial_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    pub fn serial_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }

    pub fn serial_parity(&self) -> tokio_serial::Parity {
        match self.parity {
            ParityMode::None => tokio_serial::Parity::None,
            ParityMode::Even => tokio_serial::Parity::Even,
            ParityMode::Odd => tokio_serial::Parity::Odd,
        }
    }

    /// Serialise for the host's config store.
    pub fn to_json(&self) -> GatewayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialise a previously stored blob; missing fields take defaults.
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Gateway tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds between status poll sweeps.
    pub poll_interval_s: u64,
    /// Minimum gap between two transport operations, in milliseconds.
    pub throttle_ms: u64,
    /// Seconds of post-write read suppression and holding-shadow trust.
    pub cache_write_s: u64,
    /// Seconds an error read stays cached.
    pub cache_error_s: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: DEFAULT_POLL_INTERVAL_S,
            throttle_ms: DEFAULT_THROTTLE_MS,
            cache_write_s: DEFAULT_CACHE_WRITE_S,
            cache_error_s: DEFAULT_CACHE_ERROR_S,
        }
    }
}

/// Snapshot of a discovery result: which slots are present plus their ids.
///
/// Hosts persist this to show the known fleet before the first bus scan of a
/// new session completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUnits {
    /// Bit `i` set means unit slot `i` is registered.
    pub bitmap: u64,
    /// Ids of the registered units, ascending by slot index.
    pub ids: Vec<String>,
}

impl RegisteredUnits {
    pub fn is_registered(&self, index: u8) -> bool {
        index < 64 && self.bitmap & (1 << index) != 0
    }

    pub fn to_json(&self) -> GatewayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> GatewayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtu_config_json_roundtrip() {
        let config = RtuConfig {
            port: "/dev/ttyAMA0".to_string(),
            baud_rate: 19200,
            parity: ParityMode::None,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(RtuConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rtu_config_defaults_fill_missing_fields() {
        let config = RtuConfig::from_json("{\"baud_rate\": 19200}").unwrap();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.slave_id, 1);
        assert_eq!(config.parity, ParityMode::Even);
        assert_eq!(config.timeout_ms, 1200);
    }

    #[test]
    fn test_gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.poll_interval_s, 10);
        assert_eq!(config.throttle_ms, 25);
        assert_eq!(config.cache_write_s, 35);
        assert_eq!(config.cache_error_s, 10);
    }

    #[test]
    fn test_registered_units_bitmap() {
        let units = RegisteredUnits {
            bitmap: (1 << 0) | (1 << 17),
            ids: vec!["1-00".to_string(), "2-01".to_string()],
        };
        assert!(units.is_registered(0));
        assert!(units.is_registered(17));
        assert!(!units.is_registered(1));
        let json = units.to_json().unwrap();
        assert_eq!(RegisteredUnits::from_json(&json).unwrap(), units);
    }
}
