//! Operator console: input parsing and status rendering.

use eq3_domain::address::DeviceAddress;
use eq3_domain::thermostat::ThermostatStatus;

/// A console line that is neither blank nor a temperature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a temperature in °C, got {0:?}")]
pub struct InputError(String);

/// Parse one line of operator input.
///
/// Returns `Ok(None)` for blank lines. Range checks are left to the session.
///
/// # Errors
///
/// Returns [`InputError`] when the line is not a number.
pub fn parse_line(line: &str) -> Result<Option<f32>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    line.parse()
        .map(Some)
        .map_err(|_| InputError(line.to_owned()))
}

/// Render a status report line: `address, mode, valve%, temperature`.
#[must_use]
pub fn status_line(address: DeviceAddress, status: &ThermostatStatus) -> String {
    format!(
        "{address}, {}, {:.0}%, {:.1}",
        status.mode, status.valve_percent, status.temperature_celsius
    )
}
