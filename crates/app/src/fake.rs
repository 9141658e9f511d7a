//! In-memory [`Transport`] for engine tests.
//!
//! Every peripheral exposes both thermostat characteristics unless told
//! otherwise. Notifications are injected with [`FakeTransport::notify`];
//! with [`FakeTransport::echo_status`] the fake behaves like a thermostat and
//! answers each set-temperature write with a status notification.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eq3_domain::address::DeviceAddress;
use eq3_domain::protocol::{self, NOTIFY_CHAR};

use crate::error::TransportError;
use crate::lock;
use crate::ports::{Advertisement, NotifyCallback, Transport};

pub(crate) type FakeSource = (DeviceAddress, uuid::Uuid);

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeConnection {
    address: DeviceAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeCharacteristic {
    address: DeviceAddress,
    uuid: uuid::Uuid,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeError(&'static str);

#[derive(Default)]
struct State {
    advertisements: Vec<Advertisement>,
    refused: HashSet<DeviceAddress>,
    missing: HashSet<uuid::Uuid>,
    fail_writes: bool,
    echo_status: bool,
    connected: HashSet<DeviceAddress>,
    callbacks: HashMap<DeviceAddress, NotifyCallback<FakeSource>>,
    on_subscribe: Option<Hook>,
    connects: usize,
    disconnects: usize,
    subscriptions: usize,
    write_attempts: usize,
    writes: Vec<(DeviceAddress, Vec<u8>)>,
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    state: Mutex<State>,
}

impl FakeTransport {
    pub(crate) fn with_advertisements(advertisements: Vec<Advertisement>) -> Self {
        let transport = Self::default();
        lock(&transport.state).advertisements = advertisements;
        transport
    }

    pub(crate) fn refuse_connect(&self, address: DeviceAddress) {
        lock(&self.state).refused.insert(address);
    }

    pub(crate) fn remove_characteristic(&self, uuid: uuid::Uuid) {
        lock(&self.state).missing.insert(uuid);
    }

    pub(crate) fn fail_writes(&self) {
        lock(&self.state).fail_writes = true;
    }

    pub(crate) fn echo_status(&self) {
        lock(&self.state).echo_status = true;
    }

    /// Run `hook` inside every `subscribe`, once the callback is installed
    /// and before the session finishes resolving.
    pub(crate) fn on_subscribe(&self, hook: impl Fn() + Send + Sync + 'static) {
        lock(&self.state).on_subscribe = Some(Arc::new(hook));
    }

    /// Simulate the peripheral going out of range.
    pub(crate) fn drop_connection(&self, address: DeviceAddress) {
        lock(&self.state).connected.remove(&address);
    }

    /// Deliver a notification as if it arrived on the device's notify
    /// characteristic. Subscriptions outlive disconnects, like stale router
    /// entries do.
    pub(crate) fn notify(&self, address: DeviceAddress, data: &[u8]) {
        let callback = lock(&self.state).callbacks.get(&address).cloned();
        if let Some(callback) = callback {
            callback((address, NOTIFY_CHAR), data.to_vec());
        }
    }

    pub(crate) fn connects(&self) -> usize {
        lock(&self.state).connects
    }

    pub(crate) fn disconnects(&self) -> usize {
        lock(&self.state).disconnects
    }

    pub(crate) fn subscriptions(&self) -> usize {
        lock(&self.state).subscriptions
    }

    pub(crate) fn write_attempts(&self) -> usize {
        lock(&self.state).write_attempts
    }

    pub(crate) fn writes(&self) -> Vec<(DeviceAddress, Vec<u8>)> {
        lock(&self.state).writes.clone()
    }
}

impl Transport for FakeTransport {
    type Connection = FakeConnection;
    type Characteristic = FakeCharacteristic;
    type Source = FakeSource;

    fn scan(
        &self,
        _duration: Duration,
        _active: bool,
    ) -> impl Future<Output = Result<Vec<Advertisement>, TransportError>> + Send {
        let advertisements = lock(&self.state).advertisements.clone();
        async { Ok(advertisements) }
    }

    fn connect(
        &self,
        address: DeviceAddress,
    ) -> impl Future<Output = Result<FakeConnection, TransportError>> + Send {
        let mut state = lock(&self.state);
        state.connects += 1;
        let result = if state.refused.contains(&address) {
            Err(TransportError::new(FakeError("connection refused")))
        } else {
            state.connected.insert(address);
            Ok(FakeConnection { address })
        };
        async { result }
    }

    fn disconnect(
        &self,
        connection: &FakeConnection,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let mut state = lock(&self.state);
        state.disconnects += 1;
        state.connected.remove(&connection.address);
        async { Ok(()) }
    }

    fn is_connected(&self, connection: &FakeConnection) -> impl Future<Output = bool> + Send {
        let connected = lock(&self.state).connected.contains(&connection.address);
        async move { connected }
    }

    fn characteristic(
        &self,
        connection: &FakeConnection,
        _service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> impl Future<Output = Result<Option<FakeCharacteristic>, TransportError>> + Send {
        let found = (!lock(&self.state).missing.contains(&characteristic)).then(|| {
            FakeCharacteristic {
                address: connection.address,
                uuid: characteristic,
            }
        });
        async { Ok(found) }
    }

    fn write(
        &self,
        connection: &FakeConnection,
        _characteristic: &FakeCharacteristic,
        data: &[u8],
        _with_response: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let (result, echo) = {
            let mut state = lock(&self.state);
            state.write_attempts += 1;
            if state.fail_writes {
                (Err(TransportError::new(FakeError("write rejected"))), None)
            } else {
                state.writes.push((connection.address, data.to_vec()));
                let echo = match data {
                    [protocol::OP_SET_TEMPERATURE, raw] if state.echo_status => {
                        Some([0x02, 0x01, 0x08, 0x00, 0x00, *raw])
                    }
                    _ => None,
                };
                (Ok(()), echo)
            }
        };
        if let Some(status) = echo {
            self.notify(connection.address, &status);
        }
        async { result }
    }

    fn notification_source(
        &self,
        _connection: &FakeConnection,
        characteristic: &FakeCharacteristic,
    ) -> FakeSource {
        (characteristic.address, characteristic.uuid)
    }

    fn subscribe(
        &self,
        connection: &FakeConnection,
        _characteristic: &FakeCharacteristic,
        callback: NotifyCallback<FakeSource>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let hook = {
            let mut state = lock(&self.state);
            state.subscriptions += 1;
            state.callbacks.insert(connection.address, callback);
            state.on_subscribe.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
        async { Ok(()) }
    }
}
