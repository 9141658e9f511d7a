//! eQ-3 GATT protocol: UUIDs and the wire codec.
//!
//! Pure functions operating on raw `&[u8]` slices, no BLE dependency needed.
//!
//! ## Status notification (device → client)
//!
//! | Offset | Field | Encoding |
//! |--------|-------|----------|
//! | 0–1 | Header | `0x02 0x01` |
//! | 2 | Mode | low nibble: `0x8` auto, `0x9` manual |
//! | 3 | Valve | raw / `0x64` × 100 % |
//! | 4 | - | Reserved |
//! | 5 | Set-point | raw / 2 °C |
//!
//! Bytes past offset 5 are ignored.
//!
//! ## Commands (client → device)
//!
//! | Command | Bytes |
//! |---------|-------|
//! | Set temperature | `0x41`, `round(°C × 2)` |
//! | Set mode | `0x40`, `0x00` auto / `0x40` manual |

use crate::error::{DecodeError, EncodeError};
use crate::thermostat::{Mode, ThermostatStatus};

/// GATT service exposed by eQ-3 thermostats, also present in advertisements.
pub const SERVICE_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x3e13_5142_654f_9090_134a_a6ff_5bb7_7046);

/// Characteristic on which status notifications are pushed.
pub const NOTIFY_CHAR: uuid::Uuid =
    uuid::Uuid::from_u128(0xd0e8_434d_cd29_0996_af41_6c90_f4e0_eb2a);

/// Characteristic commands are written to.
pub const COMMAND_CHAR: uuid::Uuid =
    uuid::Uuid::from_u128(0x3fa4_585a_ce4a_3bad_db4b_b8df_8179_ea09);

/// Leading bytes of a status notification.
pub const STATUS_HEADER: [u8; 2] = [0x02, 0x01];

/// Opcode of the set-temperature command.
pub const OP_SET_TEMPERATURE: u8 = 0x41;

/// Opcode of the set-mode command.
pub const OP_SET_MODE: u8 = 0x40;

const MODE_AUTO: u8 = 0x08;
const MODE_MANUAL: u8 = 0x09;
const MODE_PAYLOAD_AUTO: u8 = 0x00;
const MODE_PAYLOAD_MANUAL: u8 = 0x40;

/// Firmware scales the valve byte by this divisor, not by `0xFF`.
const VALVE_DIVISOR: f32 = 100.0;

const STATUS_MIN_LEN: usize = 6;

/// Decode a status notification.
///
/// # Errors
///
/// Returns [`DecodeError::NotAStatusReport`] when the payload does not start
/// with the status header (callers should drop these silently), or
/// [`DecodeError::Truncated`] when it is shorter than 6 bytes.
pub fn decode_status(data: &[u8]) -> Result<ThermostatStatus, DecodeError> {
    if !data.starts_with(&STATUS_HEADER) {
        return Err(DecodeError::NotAStatusReport);
    }
    if data.len() < STATUS_MIN_LEN {
        return Err(DecodeError::Truncated {
            expected: STATUS_MIN_LEN,
            actual: data.len(),
        });
    }

    let mode = match data[2] & 0x0f {
        MODE_AUTO => Mode::Auto,
        MODE_MANUAL => Mode::Manual,
        _ => Mode::Unknown,
    };

    Ok(ThermostatStatus {
        mode,
        valve_percent: f32::from(data[3]) / VALVE_DIVISOR * 100.0,
        temperature_celsius: f32::from(data[5]) / 2.0,
    })
}

/// Encode a set-temperature command.
///
/// The value is sent in half-degree steps. No clamping happens here: values
/// outside `0.0..=127.5` saturate, so callers must validate the range first.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_set_temperature(celsius: f32) -> [u8; 2] {
    [OP_SET_TEMPERATURE, (celsius * 2.0).round() as u8]
}

/// Encode a set-mode command.
///
/// # Errors
///
/// Returns [`EncodeError::UnsupportedMode`] for [`Mode::Unknown`].
pub fn encode_set_mode(mode: Mode) -> Result<[u8; 2], EncodeError> {
    let payload = match mode {
        Mode::Auto => MODE_PAYLOAD_AUTO,
        Mode::Manual => MODE_PAYLOAD_MANUAL,
        Mode::Unknown => return Err(EncodeError::UnsupportedMode(mode)),
    };
    Ok([OP_SET_MODE, payload])
}
