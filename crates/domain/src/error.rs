//! Error types for the pure domain layer.
//!
//! Each error is typed and carries only the data needed to describe the
//! failure. Higher layers wrap them via `#[from]`.

/// Why a notification payload could not be decoded into a status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload does not start with the `0x02 0x01` status header.
    ///
    /// Thermostats push other notification kinds on the same characteristic;
    /// these are expected and should be discarded silently.
    #[error("notification is not a status report")]
    NotAStatusReport,

    /// The payload carries the status header but is too short to hold a
    /// full report.
    #[error("status report must be at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count of a status report.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}

/// Why a command could not be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Only `Auto` and `Manual` exist on the wire.
    #[error("mode {0} cannot be sent to a thermostat")]
    UnsupportedMode(crate::thermostat::Mode),
}

/// Why a string could not be parsed as a device address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The string does not contain exactly six `:`-separated octets.
    #[error("expected 6 octets, got {0}")]
    WrongOctetCount(usize),

    /// One of the octets is not a two-digit hexadecimal number.
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermostat::Mode;

    #[test]
    fn should_display_not_a_status_report() {
        assert_eq!(
            DecodeError::NotAStatusReport.to_string(),
            "notification is not a status report"
        );
    }

    #[test]
    fn should_display_truncated() {
        let err = DecodeError::Truncated {
            expected: 6,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "status report must be at least 6 bytes, got 3"
        );
    }

    #[test]
    fn should_display_unsupported_mode() {
        let err = EncodeError::UnsupportedMode(Mode::Unknown);
        assert_eq!(err.to_string(), "mode unknown cannot be sent to a thermostat");
    }

    #[test]
    fn should_display_address_errors() {
        assert_eq!(
            AddressParseError::WrongOctetCount(4).to_string(),
            "expected 6 octets, got 4"
        );
        assert_eq!(
            AddressParseError::InvalidOctet("zz".to_owned()).to_string(),
            "invalid octet \"zz\""
        );
    }
}
