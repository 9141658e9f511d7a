//! BLE adapter error types.

use eq3_app::error::TransportError;
use eq3_domain::address::DeviceAddress;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// The address was not seen, even after a scan.
    #[error("peripheral {0} not found")]
    PeripheralNotFound(DeviceAddress),

    /// A `btleplug` operation failed.
    #[error("BLE operation failed")]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleError> for TransportError {
    fn from(err: BleError) -> Self {
        TransportError::new(err)
    }
}
