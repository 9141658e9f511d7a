//! Transport port: the BLE primitives the device engine is built on.
//!
//! A transport scans for advertisements, opens GATT connections, looks up
//! characteristics, writes values and delivers notifications. The engine
//! never sees the concrete BLE stack; the `eq3-adapter-ble` crate provides
//! the `btleplug` implementation and tests provide an in-memory fake.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use eq3_domain::address::DeviceAddress;

use crate::error::TransportError;

/// Entry point a transport invokes for every notification it receives.
///
/// The first argument identifies where the payload came from (see
/// [`Transport::notification_source`]); it carries no reference to a
/// session; the [`NotificationRouter`](crate::router::NotificationRouter)
/// resolves that.
pub type NotifyCallback<S> = Arc<dyn Fn(S, Vec<u8>) + Send + Sync>;

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Hardware address of the advertiser.
    pub address: DeviceAddress,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Advertised service UUIDs; `None` when the advertisement carries no
    /// service list at all.
    pub services: Option<Vec<uuid::Uuid>>,
}

impl Advertisement {
    /// Whether `service` is among the advertised service UUIDs.
    #[must_use]
    pub fn advertises(&self, service: uuid::Uuid) -> bool {
        self.services
            .as_deref()
            .is_some_and(|services| services.contains(&service))
    }
}

/// BLE transport used by device sessions.
///
/// Implementations apply their own timeouts; the engine adds none and never
/// retries on its own.
pub trait Transport: Send + Sync + 'static {
    /// An open GATT connection to one peripheral.
    type Connection: Clone + Send + Sync + 'static;
    /// A resolved characteristic on a connection.
    type Characteristic: Clone + Send + Sync + 'static;
    /// Opaque handle identifying where a notification came from.
    type Source: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Scan for advertisements for `duration`.
    fn scan(
        &self,
        duration: Duration,
        active: bool,
    ) -> impl Future<Output = Result<Vec<Advertisement>, TransportError>> + Send;

    /// Open a connection to the peripheral with the given address.
    fn connect(
        &self,
        address: DeviceAddress,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Close a connection.
    fn disconnect(
        &self,
        connection: &Self::Connection,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the connection is still alive.
    fn is_connected(&self, connection: &Self::Connection) -> impl Future<Output = bool> + Send;

    /// Look up a characteristic by service and characteristic UUID.
    ///
    /// Returns `Ok(None)` when the peripheral does not expose it.
    fn characteristic(
        &self,
        connection: &Self::Connection,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> impl Future<Output = Result<Option<Self::Characteristic>, TransportError>> + Send;

    /// Write `data` to a characteristic.
    fn write(
        &self,
        connection: &Self::Connection,
        characteristic: &Self::Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// The source handle notifications on `characteristic` will be delivered
    /// under once subscribed.
    fn notification_source(
        &self,
        connection: &Self::Connection,
        characteristic: &Self::Characteristic,
    ) -> Self::Source;

    /// Enable notifications on a characteristic and deliver them to `callback`.
    fn subscribe(
        &self,
        connection: &Self::Connection,
        characteristic: &Self::Characteristic,
        callback: NotifyCallback<Self::Source>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
