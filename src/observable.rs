//! Change notifications for the scan model.
//!
//! Two ways to observe the model:
//!
//! - Synchronous listeners registered with [`Notifier::subscribe`]. They are
//!   called in registration order, on the writer's thread, right after the
//!   state change. Events carry no values; listeners re-read the model.
//! - A `tokio::sync::watch` revision counter ([`Notifier::watch`]) for async
//!   consumers such as a scan executor task that waits for "something
//!   changed" without polling.
//!
//! # Example
//!
//! ```rust
//! use scan_timing::observable::{Notifier, ScanEvent};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let notifier = Notifier::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = hits.clone();
//! let id = notifier.subscribe(move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! notifier.notify(ScanEvent::StageParChanged);
//! notifier.unsubscribe(id);
//! notifier.notify(ScanEvent::StageParChanged);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// What changed. Payload-free except for the mode toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Size, step size, center or scan dimension of some axis.
    StageParChanged,
    /// Pulse starts or ends of some TTL device.
    SignalParChanged,
    /// Dwell time per pixel.
    SeqTimeParChanged,
    /// Continuous-laser-pulses mode switched on or off.
    ContLaserPulsesToggled {
        /// True when continuous pulses were switched on.
        enabled: bool,
    },
    /// The user asked to save the scan.
    SaveScanRequested,
    /// The user asked to load a saved scan.
    LoadScanRequested,
    /// The user asked to start the scan.
    RunScanRequested,
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(ScanEvent) + Send + Sync>;

/// Listener registry plus revision channel.
pub struct Notifier {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    revision: watch::Sender<u64>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .field("revision", &self.revision())
            .finish()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Empty registry at revision 0.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            revision,
        }
    }

    /// Register a listener. It stays registered until [`Self::unsubscribe`].
    pub fn subscribe(&self, listener: impl Fn(ScanEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver for the revision counter, bumped once per event.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Emit an event to every listener.
    pub fn notify(&self, event: ScanEvent) {
        self.revision.send_modify(|revision| *revision += 1);

        // Snapshot so listeners may (un)subscribe from inside the callback
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        tracing::trace!(?event, listeners = listeners.len(), "scan event");
        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(notifier: &Notifier) -> (SubscriptionId, Arc<Mutex<Vec<ScanEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = notifier.subscribe(move |event| sink.lock().push(event));
        (id, seen)
    }

    #[test]
    fn test_listeners_receive_events_in_order() {
        let notifier = Notifier::new();
        let (_, seen) = recorder(&notifier);

        notifier.notify(ScanEvent::StageParChanged);
        notifier.notify(ScanEvent::SeqTimeParChanged);

        assert_eq!(
            *seen.lock(),
            vec![ScanEvent::StageParChanged, ScanEvent::SeqTimeParChanged]
        );
        assert_eq!(notifier.revision(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = Notifier::new();
        let (first, first_seen) = recorder(&notifier);
        let (_, second_seen) = recorder(&notifier);
        assert_eq!(notifier.listener_count(), 2);

        assert!(notifier.unsubscribe(first));
        assert!(!notifier.unsubscribe(first));
        notifier.notify(ScanEvent::SignalParChanged);

        assert!(first_seen.lock().is_empty());
        assert_eq!(*second_seen.lock(), vec![ScanEvent::SignalParChanged]);
    }

    #[test]
    fn test_listener_may_subscribe_during_notify() {
        let notifier = Arc::new(Notifier::new());
        let inner = notifier.clone();
        notifier.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        notifier.notify(ScanEvent::RunScanRequested);
        assert_eq!(notifier.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_watch_revision() {
        let notifier = Notifier::new();
        let mut rx = notifier.watch();
        assert_eq!(*rx.borrow(), 0);

        notifier.notify(ScanEvent::ContLaserPulsesToggled { enabled: true });
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }
}
