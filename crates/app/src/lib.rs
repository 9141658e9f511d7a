//! # eq3-app
//!
//! Application layer: the device engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the [`Transport`](ports::Transport) port that BLE adapters implement
//! - [`DeviceSession`](session::DeviceSession): per-thermostat connection
//!   lifecycle, cached characteristics and last decoded status
//! - [`NotificationRouter`](router::NotificationRouter): maps the transport's
//!   notification sources back to the owning session
//! - [`DeviceRegistry`](registry::DeviceRegistry): the ordered set of known
//!   sessions and the two discovery strategies
//!
//! ## Dependency rule
//! Depends on `eq3-domain` only (plus `tokio::sync` for the connection lock).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod error;
pub mod ports;
pub mod registry;
pub mod router;
pub mod session;

#[cfg(test)]
mod fake;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
