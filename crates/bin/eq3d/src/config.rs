//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `eq3d.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use eq3_adapter_ble::BleConfig;
use eq3_domain::address::DeviceAddress;
use eq3_domain::error::AddressParseError;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BLE adapter settings.
    pub ble: BleConfig,
    /// Thermostats to drive.
    pub devices: DevicesConfig,
    /// Periodic status report.
    pub status: StatusConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Known thermostats.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Addresses to connect to. Empty means discover by scanning.
    pub addresses: Vec<DeviceAddress>,
}

/// Status report configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Seconds between two status reports.
    pub interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `eq3d.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if an
    /// override or the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("eq3d.toml")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("EQ3_DEVICES") {
            self.devices.addresses = parse_addresses(&val)?;
        }
        if let Ok(val) = std::env::var("EQ3_STATUS_INTERVAL") {
            if let Ok(secs) = val.parse() {
                self.status.interval_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("EQ3_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.status.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "status interval must be non-zero".to_string(),
            ));
        }
        if self.ble.scan_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "scan duration must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl StatusConfig {
    /// Period of the status report.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "eq3d=info,eq3=info".to_string(),
        }
    }
}

/// Parse a comma-separated address list, skipping empty items.
fn parse_addresses(list: &str) -> Result<Vec<DeviceAddress>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(ConfigError::Address))
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// An address in `EQ3_DEVICES` is malformed.
    #[error("invalid device address")]
    Address(#[source] AddressParseError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert!(config.devices.addresses.is_empty());
        assert_eq!(config.status.interval(), Duration::from_secs(30));
        assert_eq!(config.logging.filter, "eq3d=info,eq3=info");
        assert_eq!(config.ble.scan_duration_secs, 5);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.status.interval_secs, 30);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [ble]
            adapter_index = 1
            scan_duration_secs = 10
            active_scan = false
            connect_scan_secs = 2

            [devices]
            addresses = ['00:1A:22:0E:CB:D4', '00:1a:22:0e:cb:d5']

            [status]
            interval_secs = 60

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ble.adapter_index, 1);
        assert_eq!(config.ble.scan_duration_secs, 10);
        assert!(!config.ble.active_scan);
        assert_eq!(config.ble.connect_scan_secs, 2);
        assert_eq!(
            config.devices.addresses,
            vec![
                DeviceAddress::new([0x00, 0x1A, 0x22, 0x0E, 0xCB, 0xD4]),
                DeviceAddress::new([0x00, 0x1A, 0x22, 0x0E, 0xCB, 0xD5]),
            ]
        );
        assert_eq!(config.status.interval_secs, 60);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [status]
            interval_secs = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.status.interval_secs, 5);
        assert_eq!(config.ble.connect_scan_secs, 5);
        assert_eq!(config.logging.filter, "eq3d=info,eq3=info");
    }

    #[test]
    fn should_reject_malformed_address_in_file() {
        let toml = "
            [devices]
            addresses = ['00:1A:22']
        ";
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.status.interval_secs, 30);
    }

    #[test]
    fn should_reject_zero_interval() {
        let mut config = Config::default();
        config.status.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_scan_duration() {
        let mut config = Config::default();
        config.ble.scan_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_parse_address_list() {
        let addresses = parse_addresses("00:1A:22:0E:CB:D4, 00:1a:22:0e:cb:d5,").unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[1].to_string(), "00:1A:22:0E:CB:D5");
    }

    #[test]
    fn should_parse_empty_address_list() {
        assert!(parse_addresses("").unwrap().is_empty());
    }

    #[test]
    fn should_reject_malformed_address_list() {
        let err = parse_addresses("00:1A:22:0E:CB:D4,nope").unwrap_err();
        assert!(matches!(err, ConfigError::Address(_)));
    }
}
