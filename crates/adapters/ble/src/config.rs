//! BLE adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the `btleplug` transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Which host adapter to use, in the order the OS lists them.
    pub adapter_index: usize,
    /// How long a discovery scan runs, in seconds.
    pub scan_duration_secs: u16,
    /// Request active scanning (scan responses) where the platform allows it.
    pub active_scan: bool,
    /// How long to scan for a known address the host has not seen yet
    /// before connecting, in seconds.
    pub connect_scan_secs: u16,
}

impl BleConfig {
    /// Discovery scan duration.
    #[must_use]
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_duration_secs))
    }

    /// Pre-connect scan duration.
    #[must_use]
    pub fn connect_scan_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_scan_secs))
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            scan_duration_secs: 5,
            active_scan: true,
            connect_scan_secs: 5,
        }
    }
}
