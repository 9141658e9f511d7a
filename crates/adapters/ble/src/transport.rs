//! `btleplug` transport.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use eq3_app::error::TransportError;
use eq3_app::ports::{Advertisement, NotifyCallback, Transport};
use eq3_domain::address::DeviceAddress;
use eq3_domain::protocol::SERVICE_UUID;

use crate::config::BleConfig;
use crate::error::BleError;

/// Capacity of the channel returned by [`BtleplugTransport::disconnections`].
const DISCONNECT_CHANNEL_CAPACITY: usize = 16;

fn device_address(addr: BDAddr) -> DeviceAddress {
    DeviceAddress::new(addr.into_inner())
}

/// An open connection to one peripheral.
#[derive(Debug, Clone)]
pub struct BleConnection {
    address: DeviceAddress,
    peripheral: Peripheral,
}

impl BleConnection {
    /// Address of the connected peripheral.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.address
    }
}

/// Where a notification came from: a characteristic on a given peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BleSource {
    /// Peripheral the notification was received from.
    pub address: DeviceAddress,
    /// Characteristic that notified.
    pub characteristic: uuid::Uuid,
}

/// [`Transport`] backed by one host Bluetooth adapter.
pub struct BtleplugTransport {
    adapter: Adapter,
    config: BleConfig,
    /// Notification forwarding task per peripheral.
    listeners: Mutex<HashMap<DeviceAddress, JoinHandle<()>>>,
}

impl BtleplugTransport {
    /// Open the host adapter selected by `config.adapter_index`.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when the host has no adapter at
    /// that index, or [`BleError::Btleplug`] when the Bluetooth stack cannot
    /// be reached.
    pub async fn new(config: BleConfig) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleError::NotAvailable)?;

        match adapter.adapter_info().await {
            Ok(info) => tracing::info!(%info, "using BLE adapter"),
            Err(err) => tracing::debug!(%err, "unable to describe BLE adapter"),
        }

        Ok(Self {
            adapter,
            config,
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// Adapter configuration.
    #[must_use]
    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    /// Addresses of peripherals the host reports as disconnected.
    ///
    /// Spawns a task watching the adapter's event stream; it stops when the
    /// receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::Btleplug`] when the event stream cannot be opened.
    pub async fn disconnections(&self) -> Result<mpsc::Receiver<DeviceAddress>, BleError> {
        let mut events = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let (sender, receiver) = mpsc::channel(DISCONNECT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceConnected(id) => {
                        if let Some(address) = resolve_address(&adapter, &id).await {
                            tracing::info!(%address, "connected");
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        let Some(address) = resolve_address(&adapter, &id).await else {
                            continue;
                        };
                        tracing::info!(%address, "disconnected");
                        if sender.send(address).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            tracing::debug!("adapter event stream ended");
        });

        Ok(receiver)
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<DeviceAddress, JoinHandle<()>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_listener(&self, address: DeviceAddress) {
        if let Some(handle) = self.listeners().remove(&address) {
            handle.abort();
        }
    }

    /// Run a scan for `duration`, collecting every peripheral reported.
    async fn scan_for(
        &self,
        filter: ScanFilter,
        duration: Duration,
    ) -> Result<HashSet<PeripheralId>, BleError> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(filter).await?;

        let mut seen = HashSet::new();
        let deadline = tokio::time::Instant::now() + duration;
        while tokio::time::Instant::now() < deadline {
            let remaining = deadline - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, events.next()).await {
                Ok(Some(
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ServicesAdvertisement { id, .. },
                )) => {
                    seen.insert(id);
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        self.adapter.stop_scan().await?;
        Ok(seen)
    }

    async fn scan_inner(
        &self,
        duration: Duration,
        active: bool,
    ) -> Result<Vec<Advertisement>, BleError> {
        // btleplug leaves active/passive scanning to the platform.
        tracing::debug!(?duration, active, "starting BLE scan");
        let seen = self.scan_for(ScanFilter::default(), duration).await?;

        let mut advertisements = Vec::with_capacity(seen.len());
        for id in seen {
            let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                continue;
            };
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let address = device_address(props.address);
            tracing::trace!(%address, name = ?props.local_name, "BLE device detected");
            advertisements.push(Advertisement {
                address,
                local_name: props.local_name,
                services: (!props.services.is_empty()).then_some(props.services),
            });
        }

        tracing::debug!(count = advertisements.len(), "BLE scan finished");
        Ok(advertisements)
    }

    async fn find_peripheral(
        &self,
        address: DeviceAddress,
    ) -> Result<Option<Peripheral>, BleError> {
        let wanted = BDAddr::from(address.octets());
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals.into_iter().find(|p| p.address() == wanted))
    }

    async fn connect_inner(&self, address: DeviceAddress) -> Result<BleConnection, BleError> {
        let peripheral = match self.find_peripheral(address).await? {
            Some(peripheral) => peripheral,
            None => {
                tracing::debug!(%address, "peripheral unknown to the host, scanning");
                let filter = ScanFilter {
                    services: vec![SERVICE_UUID],
                };
                self.scan_for(filter, self.config.connect_scan_duration())
                    .await?;
                self.find_peripheral(address)
                    .await?
                    .ok_or(BleError::PeripheralNotFound(address))?
            }
        };

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        Ok(BleConnection {
            address,
            peripheral,
        })
    }

    async fn disconnect_inner(&self, connection: &BleConnection) -> Result<(), BleError> {
        self.stop_listener(connection.address);
        connection.peripheral.disconnect().await?;
        Ok(())
    }

    async fn subscribe_inner(
        &self,
        connection: &BleConnection,
        characteristic: &Characteristic,
        callback: NotifyCallback<BleSource>,
    ) -> Result<(), BleError> {
        let mut notifications = connection.peripheral.notifications().await?;
        connection.peripheral.subscribe(characteristic).await?;

        let address = connection.address;
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                tracing::trace!(%address, uuid = %notification.uuid, "notification received");
                callback(
                    BleSource {
                        address,
                        characteristic: notification.uuid,
                    },
                    notification.value,
                );
            }
            tracing::debug!(%address, "notification stream ended");
        });

        if let Some(previous) = self.listeners().insert(address, handle) {
            previous.abort();
        }
        Ok(())
    }
}

async fn resolve_address(adapter: &Adapter, id: &PeripheralId) -> Option<DeviceAddress> {
    match adapter.peripheral(id).await {
        Ok(peripheral) => Some(device_address(peripheral.address())),
        Err(err) => {
            tracing::debug!(%err, "event for unknown peripheral");
            None
        }
    }
}

impl Transport for BtleplugTransport {
    type Connection = BleConnection;
    type Characteristic = Characteristic;
    type Source = BleSource;

    fn scan(
        &self,
        duration: Duration,
        active: bool,
    ) -> impl Future<Output = Result<Vec<Advertisement>, TransportError>> + Send {
        async move { Ok(self.scan_inner(duration, active).await?) }
    }

    fn connect(
        &self,
        address: DeviceAddress,
    ) -> impl Future<Output = Result<BleConnection, TransportError>> + Send {
        async move { Ok(self.connect_inner(address).await?) }
    }

    fn disconnect(
        &self,
        connection: &BleConnection,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move { Ok(self.disconnect_inner(connection).await?) }
    }

    fn is_connected(&self, connection: &BleConnection) -> impl Future<Output = bool> + Send {
        async move {
            match connection.peripheral.is_connected().await {
                Ok(connected) => connected,
                Err(err) => {
                    tracing::debug!(address = %connection.address, %err, "connection check failed");
                    false
                }
            }
        }
    }

    fn characteristic(
        &self,
        connection: &BleConnection,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> impl Future<Output = Result<Option<Characteristic>, TransportError>> + Send {
        let found = connection
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic);
        async move { Ok(found) }
    }

    fn write(
        &self,
        connection: &BleConnection,
        characteristic: &Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        async move {
            connection
                .peripheral
                .write(characteristic, data, write_type)
                .await
                .map_err(BleError::from)?;
            Ok(())
        }
    }

    fn notification_source(
        &self,
        connection: &BleConnection,
        characteristic: &Characteristic,
    ) -> BleSource {
        BleSource {
            address: connection.address,
            characteristic: characteristic.uuid,
        }
    }

    fn subscribe(
        &self,
        connection: &BleConnection,
        characteristic: &Characteristic,
        callback: NotifyCallback<BleSource>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move { Ok(self.subscribe_inner(connection, characteristic, callback).await?) }
    }
}
