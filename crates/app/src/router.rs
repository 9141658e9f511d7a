//! Notification router: maps transport notification sources to sessions.
//!
//! A transport delivers every notification through one callback that knows
//! nothing about sessions. Sessions register the source handle of their
//! notify characteristic here while resolving, and the router's
//! [`callback`](NotificationRouter::callback) is what gets handed to the
//! transport.
//!
//! Entries hold weak references and are never removed on disconnect: a
//! lookup may hit a session that has since gone away (reported as
//! [`DispatchError::StaleNotificationSource`]) or one that is disconnected
//! (the session discards the payload itself).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use crate::error::DispatchError;
use crate::lock;
use crate::ports::NotifyCallback;

/// Receiver of routed notification payloads.
pub trait NotificationSink: Send + Sync {
    /// Handle one notification payload.
    fn handle_notification(&self, data: &[u8]);
}

/// Keyed registry from notification source to session.
pub struct NotificationRouter<S> {
    entries: Mutex<HashMap<S, Weak<dyn NotificationSink>>>,
}

impl<S> Default for NotificationRouter<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> NotificationRouter<S>
where
    S: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route notifications from `source` to `sink`, replacing any previous entry.
    pub fn register(&self, source: S, sink: Weak<dyn NotificationSink>) {
        tracing::debug!(?source, "registering notification source");
        lock(&self.entries).insert(source, sink);
    }

    /// Deliver a payload to the session registered for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::StaleNotificationSource`] when nothing is
    /// registered for `source` or the registered session no longer exists.
    /// The payload is dropped; nothing else changes.
    pub fn dispatch(&self, source: &S, data: &[u8]) -> Result<(), DispatchError> {
        // Release the lock before calling into the session.
        let sink = lock(&self.entries).get(source).and_then(Weak::upgrade);
        let Some(sink) = sink else {
            return Err(DispatchError::StaleNotificationSource {
                handle: format!("{source:?}"),
            });
        };
        sink.handle_notification(data);
        Ok(())
    }

    /// Build the callback to hand to [`Transport::subscribe`](crate::ports::Transport::subscribe).
    ///
    /// Dispatch failures are logged and otherwise ignored.
    #[must_use]
    pub fn callback(self: &Arc<Self>) -> NotifyCallback<S> {
        let router = Arc::clone(self);
        Arc::new(move |source: S, data: Vec<u8>| {
            if let Err(err) = router.dispatch(&source, &data) {
                tracing::warn!(%err, "dropping notification");
            }
        })
    }

    /// Number of registered sources, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether no source has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl NotificationSink for RecordingSink {
        fn handle_notification(&self, data: &[u8]) {
            self.received.lock().unwrap().push(data.to_vec());
        }
    }

    impl RecordingSink {
        fn received(&self) -> Vec<Vec<u8>> {
            self.received.lock().unwrap().clone()
        }
    }

    fn weak(sink: &Arc<RecordingSink>) -> Weak<dyn NotificationSink> {
        let sink: Arc<dyn NotificationSink> = sink.clone();
        Arc::downgrade(&sink)
    }

    #[test]
    fn should_start_empty() {
        let router: NotificationRouter<u32> = NotificationRouter::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn should_dispatch_to_registered_sink() {
        let router = NotificationRouter::new();
        let sink = Arc::new(RecordingSink::default());
        router.register(7u32, weak(&sink));

        router.dispatch(&7, &[0x02, 0x01]).unwrap();

        assert_eq!(sink.received(), vec![vec![0x02, 0x01]]);
    }

    #[test]
    fn should_only_dispatch_to_matching_source() {
        let router = NotificationRouter::new();
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        router.register(1u32, weak(&first));
        router.register(2u32, weak(&second));

        router.dispatch(&2, &[0xAA]).unwrap();

        assert!(first.received().is_empty());
        assert_eq!(second.received(), vec![vec![0xAA]]);
    }

    #[test]
    fn should_report_unknown_source_without_panicking() {
        let router = NotificationRouter::new();
        let sink = Arc::new(RecordingSink::default());
        router.register(1u32, weak(&sink));

        let err = router.dispatch(&99, &[0x02, 0x01]).unwrap_err();

        assert_eq!(
            err,
            DispatchError::StaleNotificationSource {
                handle: "99".to_owned()
            }
        );
        assert!(sink.received().is_empty());
    }

    #[test]
    fn should_report_dropped_session_as_stale() {
        let router = NotificationRouter::new();
        let sink = Arc::new(RecordingSink::default());
        router.register(1u32, weak(&sink));
        drop(sink);

        let result = router.dispatch(&1, &[0x02, 0x01]);

        assert!(matches!(
            result,
            Err(DispatchError::StaleNotificationSource { .. })
        ));
        // The entry itself is kept.
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn should_overwrite_existing_entry() {
        let router = NotificationRouter::new();
        let old = Arc::new(RecordingSink::default());
        let new = Arc::new(RecordingSink::default());
        router.register(1u32, weak(&old));
        router.register(1u32, weak(&new));

        router.dispatch(&1, &[0x01]).unwrap();

        assert_eq!(router.len(), 1);
        assert!(old.received().is_empty());
        assert_eq!(new.received(), vec![vec![0x01]]);
    }

    #[test]
    fn should_route_through_transport_callback() {
        let router = Arc::new(NotificationRouter::new());
        let sink = Arc::new(RecordingSink::default());
        router.register(3u32, weak(&sink));

        let callback = router.callback();
        callback(3, vec![0x02, 0x01, 0x08]);
        callback(4, vec![0xFF]);

        assert_eq!(sink.received(), vec![vec![0x02, 0x01, 0x08]]);
    }
}
