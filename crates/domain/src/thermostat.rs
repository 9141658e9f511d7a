//! Thermostat state: operating mode, decoded status and connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating mode reported by, or requested from, a thermostat.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Follows the on-device weekly schedule.
    Auto,
    /// Holds the set-point until changed.
    Manual,
    /// No status received yet, or a mode nibble this driver does not know.
    #[default]
    Unknown,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Manual => f.write_str("manual"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Decoded operating state of a thermostat.
///
/// Only meaningful once a status notification has been processed. Until then
/// it holds the [`Default`] value: mode `Unknown`, valve 0 %, 0 °C.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermostatStatus {
    /// Current operating mode.
    pub mode: Mode,
    /// Valve opening, 0–100 %.
    pub valve_percent: f32,
    /// Target temperature in °C, half-degree resolution.
    pub temperature_celsius: f32,
}

/// Where a device session stands in its connect/resolve lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport connection.
    #[default]
    Disconnected,
    /// Connected, characteristics not yet resolved and subscribed.
    ConnectedNoCharacteristics,
    /// Characteristics resolved, notifications subscribed; commands may be sent.
    Ready,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::ConnectedNoCharacteristics => f.write_str("connected"),
            Self::Ready => f.write_str("ready"),
        }
    }
}
