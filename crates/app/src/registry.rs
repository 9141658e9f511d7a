//! Device registry: the ordered set of known thermostats.
//!
//! Sessions are added either from known addresses or by filtering scan
//! results, and are kept in insertion order for bulk operations. The
//! registry also owns the [`NotificationRouter`] shared by all its sessions.

use std::sync::Arc;
use std::time::Duration;

use eq3_domain::address::DeviceAddress;
use eq3_domain::protocol::SERVICE_UUID;

use crate::error::TransportError;
use crate::ports::{Advertisement, Transport};
use crate::router::NotificationRouter;
use crate::session::DeviceSession;

/// Whether an advertisement comes from an eQ-3 thermostat.
///
/// True only when the advertisement carries a service list that includes
/// the thermostat service UUID.
#[must_use]
pub fn is_thermostat(advertisement: &Advertisement) -> bool {
    advertisement.advertises(SERVICE_UUID)
}

/// Owns every known [`DeviceSession`].
pub struct DeviceRegistry<T: Transport> {
    transport: Arc<T>,
    router: Arc<NotificationRouter<T::Source>>,
    sessions: Vec<Arc<DeviceSession<T>>>,
}

impl<T: Transport> DeviceRegistry<T> {
    /// Create an empty registry with a fresh notification router.
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            router: Arc::new(NotificationRouter::new()),
            sessions: Vec::new(),
        }
    }

    /// The router shared by all sessions of this registry.
    #[must_use]
    pub fn router(&self) -> &Arc<NotificationRouter<T::Source>> {
        &self.router
    }

    /// Add a session for a known address without connecting.
    ///
    /// Returns the existing session if the address is already registered.
    pub fn add_known_device(&mut self, address: DeviceAddress) -> Arc<DeviceSession<T>> {
        if let Some(existing) = self.get(address) {
            return Arc::clone(existing);
        }
        tracing::info!(%address, "adding thermostat");
        let session = DeviceSession::new(
            address,
            Arc::clone(&self.transport),
            Arc::clone(&self.router),
        );
        self.sessions.push(Arc::clone(&session));
        session
    }

    /// Add a session for every advertisement accepted by `filter`.
    ///
    /// Rejected advertisements and already known addresses are skipped.
    /// Returns how many sessions were added.
    pub fn discover_by_filter<F>(&mut self, advertisements: &[Advertisement], filter: F) -> usize
    where
        F: Fn(&Advertisement) -> bool,
    {
        let mut added = 0;
        for advertisement in advertisements {
            if !filter(advertisement) {
                tracing::trace!(address = %advertisement.address, "ignoring advertisement");
                continue;
            }
            if self.get(advertisement.address).is_some() {
                continue;
            }
            self.add_known_device(advertisement.address);
            added += 1;
        }
        added
    }

    /// Scan, then add every advertiser that [`is_thermostat`].
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] if the scan fails.
    pub async fn scan_and_discover(
        &mut self,
        duration: Duration,
        active: bool,
    ) -> Result<usize, TransportError> {
        tracing::info!(duration_secs = duration.as_secs(), active, "scanning for thermostats");
        let advertisements = self.transport.scan(duration, active).await?;
        let added = self.discover_by_filter(&advertisements, is_thermostat);
        tracing::info!(seen = advertisements.len(), added, "scan complete");
        Ok(added)
    }

    /// Look up the session for an address.
    #[must_use]
    pub fn get(&self, address: DeviceAddress) -> Option<&Arc<DeviceSession<T>>> {
        self.sessions
            .iter()
            .find(|session| session.address() == address)
    }

    /// Sessions in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<DeviceSession<T>>> {
        self.sessions.iter()
    }

    /// Number of known sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Reset the session for `address` after the transport reported a drop.
    ///
    /// Returns `false` when the address is not known.
    pub async fn handle_connection_lost(&self, address: DeviceAddress) -> bool {
        let Some(session) = self.get(address) else {
            return false;
        };
        session.handle_connection_lost().await;
        true
    }

    /// Disconnect every session.
    pub async fn disconnect_all(&self) {
        for session in &self.sessions {
            session.disconnect().await;
        }
    }
}

impl<'a, T: Transport> IntoIterator for &'a DeviceRegistry<T> {
    type Item = &'a Arc<DeviceSession<T>>;
    type IntoIter = std::slice::Iter<'a, Arc<DeviceSession<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
