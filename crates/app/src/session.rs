//! Device session: connection lifecycle and cached state for one thermostat.
//!
//! A session starts `Disconnected` and connects lazily: every command calls
//! [`DeviceSession::ensure_ready`] first, which connects, resolves the notify
//! and command characteristics, and subscribes to status notifications.
//!
//! ```text
//! Disconnected ──connect──▶ ConnectedNoCharacteristics ──resolve──▶ Ready
//!      ▲                              │                               │
//!      └──── missing characteristic ──┘◀──── connection dropped ──────┘
//! ```
//!
//! The thermostat has no "read status" command. Status is only refreshed by
//! the notification a device pushes after each write, so the accessors may
//! return the default status or stale data.

use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use eq3_domain::address::DeviceAddress;
use eq3_domain::error::DecodeError;
use eq3_domain::protocol::{self, COMMAND_CHAR, NOTIFY_CHAR, SERVICE_UUID};
use eq3_domain::thermostat::{ConnectionState, Mode, ThermostatStatus};

use crate::error::SessionError;
use crate::lock;
use crate::ports::Transport;
use crate::router::{NotificationRouter, NotificationSink};

/// Lowest set-point the thermostat accepts (displayed as "OFF").
pub const MIN_TEMPERATURE: f32 = 4.5;

/// Highest set-point the thermostat accepts (displayed as "ON").
pub const MAX_TEMPERATURE: f32 = 30.0;

/// Check that `celsius` is a set-point the thermostat accepts.
///
/// # Errors
///
/// Returns [`SessionError::TemperatureOutOfRange`] when `celsius` is not
/// within [`MIN_TEMPERATURE`]..=[`MAX_TEMPERATURE`] (NaN included).
pub fn check_temperature(celsius: f32) -> Result<(), SessionError> {
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&celsius) {
        Ok(())
    } else {
        Err(SessionError::TemperatureOutOfRange(celsius))
    }
}

/// Zero-argument hook invoked after each decoded status.
///
/// The hook does not receive the status; read it back through the session
/// accessors.
pub type StatusCallback = Arc<dyn Fn() + Send + Sync>;

/// Transport handles of the two thermostat characteristics.
#[derive(Debug, Clone)]
pub struct CharacteristicHandles<C> {
    /// Characteristic status notifications arrive on.
    pub notify: C,
    /// Characteristic commands are written to.
    pub command: C,
}

/// An open, fully resolved connection.
struct Link<T: Transport> {
    connection: T::Connection,
    handles: CharacteristicHandles<T::Characteristic>,
}

impl<T: Transport> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            handles: self.handles.clone(),
        }
    }
}

#[derive(Default)]
struct Snapshot {
    status: ThermostatStatus,
    last_updated: Option<DateTime<Utc>>,
}

/// One physical thermostat.
pub struct DeviceSession<T: Transport> {
    address: DeviceAddress,
    transport: Arc<T>,
    router: Arc<NotificationRouter<T::Source>>,
    this: Weak<Self>,
    /// Serializes connect/resolve; `Some` only while `Ready`.
    link: tokio::sync::Mutex<Option<Link<T>>>,
    state: Mutex<ConnectionState>,
    snapshot: Mutex<Snapshot>,
    on_status: Mutex<Option<StatusCallback>>,
}

impl<T: Transport> DeviceSession<T> {
    /// Create a disconnected session. Nothing is sent to the device.
    #[must_use]
    pub fn new(
        address: DeviceAddress,
        transport: Arc<T>,
        router: Arc<NotificationRouter<T::Source>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            address,
            transport,
            router,
            this: this.clone(),
            link: tokio::sync::Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            snapshot: Mutex::new(Snapshot::default()),
            on_status: Mutex::new(None),
        })
    }

    /// Hardware address of the thermostat.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Last decoded status, or the unknown default.
    #[must_use]
    pub fn status(&self) -> ThermostatStatus {
        lock(&self.snapshot).status
    }

    /// Last decoded operating mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.status().mode
    }

    /// Last decoded valve opening in percent.
    #[must_use]
    pub fn valve_percent(&self) -> f32 {
        self.status().valve_percent
    }

    /// Last decoded set-point in °C.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.status().temperature_celsius
    }

    /// When the last status notification was decoded.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        lock(&self.snapshot).last_updated
    }

    /// Register the status hook, replacing any previous one.
    pub fn set_status_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *lock(&self.on_status) = Some(Arc::new(callback));
    }

    /// Bring the session to `Ready`. A no-op when it already is.
    ///
    /// Detects connections the transport has lost and reconnects, which
    /// also re-subscribes to notifications.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportConnectFailed`] when the connection
    /// cannot be opened, or [`SessionError::CharacteristicNotFound`],
    /// [`SessionError::DiscoveryFailed`] or [`SessionError::SubscribeFailed`]
    /// when resolution fails. The session is `Disconnected` afterwards.
    pub async fn ensure_ready(&self) -> Result<(), SessionError> {
        self.ready().await.map(|_| ())
    }

    /// Set the target temperature.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TemperatureOutOfRange`] without touching the
    /// device when `celsius` is not within
    /// [`MIN_TEMPERATURE`]..=[`MAX_TEMPERATURE`], any error from
    /// [`ensure_ready`](Self::ensure_ready), or [`SessionError::WriteFailed`].
    #[tracing::instrument(skip(self), fields(address = %self.address))]
    pub async fn set_temperature(&self, celsius: f32) -> Result<(), SessionError> {
        check_temperature(celsius)?;
        self.write_command(&protocol::encode_set_temperature(celsius))
            .await?;
        tracing::info!(celsius, "updated temperature");
        Ok(())
    }

    /// Switch between auto and manual mode.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Encode`] without touching the device for
    /// [`Mode::Unknown`], any error from [`ensure_ready`](Self::ensure_ready),
    /// or [`SessionError::WriteFailed`].
    #[tracing::instrument(skip(self), fields(address = %self.address))]
    pub async fn set_mode(&self, mode: Mode) -> Result<(), SessionError> {
        let command = protocol::encode_set_mode(mode)?;
        self.write_command(&command).await?;
        tracing::info!(%mode, "updated mode");
        Ok(())
    }

    /// Close the connection and drop the cached characteristics.
    ///
    /// The router entry for this session is kept; notifications still routed
    /// here are discarded while disconnected.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        let Some(current) = link.take() else {
            return;
        };
        self.set_state(ConnectionState::Disconnected);
        match self.transport.disconnect(&current.connection).await {
            Ok(()) => tracing::info!(address = %self.address, "disconnected"),
            Err(err) => tracing::warn!(address = %self.address, %err, "failed to disconnect"),
        }
    }

    /// Forget the connection after the transport reported it dropped.
    ///
    /// Reports can arrive late: when the current link is alive (a command
    /// reconnected in between) the report is ignored.
    pub async fn handle_connection_lost(&self) {
        let mut link = self.link.lock().await;
        if let Some(current) = link.as_ref() {
            if self.transport.is_connected(&current.connection).await {
                tracing::debug!(address = %self.address, "ignoring stale connection-lost report");
                return;
            }
            *link = None;
            tracing::info!(address = %self.address, "connection lost");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    async fn write_command(&self, command: &[u8]) -> Result<(), SessionError> {
        let link = self.ready().await?;
        self.transport
            .write(&link.connection, &link.handles.command, command, true)
            .await
            .map_err(|source| SessionError::WriteFailed {
                address: self.address,
                source,
            })
    }

    /// Drive the state machine to `Ready` and return the live link.
    async fn ready(&self) -> Result<Link<T>, SessionError> {
        let mut link = self.link.lock().await;

        if let Some(current) = link.as_ref() {
            if self.transport.is_connected(&current.connection).await {
                return Ok(current.clone());
            }
            tracing::warn!(address = %self.address, "connection dropped, reconnecting");
            *link = None;
            self.set_state(ConnectionState::Disconnected);
        }

        tracing::info!(address = %self.address, "connecting");
        let connection = self.transport.connect(self.address).await.map_err(|source| {
            SessionError::TransportConnectFailed {
                address: self.address,
                source,
            }
        })?;
        tracing::info!(address = %self.address, "connected");
        self.set_state(ConnectionState::ConnectedNoCharacteristics);

        match self.resolve(&connection).await {
            Ok(handles) => {
                let ready = Link {
                    connection,
                    handles,
                };
                *link = Some(ready.clone());
                self.set_state(ConnectionState::Ready);
                Ok(ready)
            }
            Err(err) => {
                if let Err(disconnect_err) = self.transport.disconnect(&connection).await {
                    tracing::warn!(
                        address = %self.address,
                        err = %disconnect_err,
                        "failed to disconnect after resolution failure"
                    );
                }
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    /// Find both characteristics and subscribe to notifications.
    ///
    /// Subscriptions do not survive a reconnect, so this runs on every
    /// connection.
    async fn resolve(
        &self,
        connection: &T::Connection,
    ) -> Result<CharacteristicHandles<T::Characteristic>, SessionError> {
        let notify = self.find_characteristic(connection, NOTIFY_CHAR).await?;
        let command = self.find_characteristic(connection, COMMAND_CHAR).await?;

        let source = self.transport.notification_source(connection, &notify);
        let sink: Weak<dyn NotificationSink> = self.this.clone();
        self.router.register(source, sink);

        self.transport
            .subscribe(connection, &notify, self.router.callback())
            .await
            .map_err(|source| SessionError::SubscribeFailed {
                address: self.address,
                source,
            })?;

        Ok(CharacteristicHandles { notify, command })
    }

    async fn find_characteristic(
        &self,
        connection: &T::Connection,
        uuid: uuid::Uuid,
    ) -> Result<T::Characteristic, SessionError> {
        self.transport
            .characteristic(connection, SERVICE_UUID, uuid)
            .await
            .map_err(|source| SessionError::DiscoveryFailed {
                address: self.address,
                source,
            })?
            .ok_or(SessionError::CharacteristicNotFound {
                address: self.address,
                uuid,
            })
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }
}

impl<T: Transport> NotificationSink for DeviceSession<T> {
    fn handle_notification(&self, data: &[u8]) {
        if self.connection_state() == ConnectionState::Disconnected {
            tracing::debug!(address = %self.address, "discarding notification while disconnected");
            return;
        }

        let status = match protocol::decode_status(data) {
            Ok(status) => status,
            Err(DecodeError::NotAStatusReport) => {
                tracing::debug!(address = %self.address, "skipping non-status notification");
                return;
            }
            Err(err) => {
                tracing::debug!(address = %self.address, %err, "discarding malformed notification");
                return;
            }
        };

        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.status = status;
            snapshot.last_updated = Some(Utc::now());
        }
        tracing::debug!(
            address = %self.address,
            mode = %status.mode,
            valve = status.valve_percent,
            temperature = status.temperature_celsius,
            "status updated"
        );

        let callback = lock(&self.on_status).clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}
