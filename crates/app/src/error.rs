//! Error types for the device engine.

use eq3_domain::address::DeviceAddress;
use eq3_domain::error::EncodeError;

/// A failure reported by a [`Transport`](crate::ports::Transport).
///
/// Adapters wrap their own error type; the engine only needs the source
/// chain for diagnostics.
#[derive(Debug, thiserror::Error)]
#[error("transport operation failed")]
pub struct TransportError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    /// Wrap an adapter-specific error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

/// Errors surfaced by a [`DeviceSession`](crate::session::DeviceSession).
///
/// Every variant leaves the session either unchanged or back in
/// `Disconnected`; none of them is fatal and none is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport could not open a connection.
    #[error("failed to connect to {address}")]
    TransportConnectFailed {
        /// Device the connection was attempted to.
        address: DeviceAddress,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The transport failed while looking up characteristics.
    #[error("failed to discover characteristics on {address}")]
    DiscoveryFailed {
        /// Device being resolved.
        address: DeviceAddress,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The device does not expose one of the thermostat characteristics.
    #[error("characteristic {uuid} not found on {address}")]
    CharacteristicNotFound {
        /// Device being resolved.
        address: DeviceAddress,
        /// The missing characteristic.
        uuid: uuid::Uuid,
    },

    /// Notifications could not be enabled.
    #[error("failed to subscribe to notifications from {address}")]
    SubscribeFailed {
        /// Device being resolved.
        address: DeviceAddress,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// A command write was rejected by the transport.
    #[error("failed to write command to {address}")]
    WriteFailed {
        /// Device the command was sent to.
        address: DeviceAddress,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The requested set-point is outside what the device accepts.
    #[error("temperature {0} °C is outside the device range")]
    TemperatureOutOfRange(f32),

    /// The command cannot be expressed on the wire.
    #[error("invalid command")]
    Encode(#[from] EncodeError),
}

/// Why the [`NotificationRouter`](crate::router::NotificationRouter) dropped
/// a notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No live session is registered for the source handle.
    #[error("no session registered for notification source {handle}")]
    StaleNotificationSource {
        /// Debug rendering of the transport handle.
        handle: String,
    },
}
