//! # eq3-adapter-ble
//!
//! `btleplug` implementation of the [`Transport`](eq3_app::ports::Transport)
//! port.
//!
//! ## How it works
//!
//! [`BtleplugTransport`] wraps one host Bluetooth adapter. Connections are
//! opened by address; when the host has not seen the address yet, a short
//! scan filtered on the thermostat service runs first. Each subscription
//! spawns a task that forwards the peripheral's notification stream to the
//! callback handed over by the device engine, tagged with a [`BleSource`].
//!
//! Disconnects the host reports on its own are exposed through
//! [`BtleplugTransport::disconnections`] so the caller can reset sessions.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `eq3-app` and `eq3-domain`.

mod config;
mod error;
mod transport;

pub use config::BleConfig;
pub use error::BleError;
pub use transport::{BleConnection, BleSource, BtleplugTransport};
