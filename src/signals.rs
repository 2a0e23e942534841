// SPDX-License-Identifier: GPL-3.0-only

//! Observer registry for handler events
//!
//! Each event category is a [`Signal`] holding its listeners in
//! registration order. Emitting is synchronous: every listener has returned
//! by the time `emit` does. Listeners are invoked from a snapshot taken
//! before the first call, so a listener may call back into the emitting
//! handler (for example `stop()` from a `frame_ready` listener) or connect
//! further listeners, which only see the next emission.

use crate::media::Frame;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned by [`Signal::connect`], used to disconnect the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered set of listeners for one event category
pub struct Signal<T> {
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener; it runs after every listener registered before it
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn disconnect_all(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `value` to every listener in registration order
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(value);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener<T>)>> {
        // Listeners never run under this lock, so a poisoned list is still consistent
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Event surface shared by `MediaHandler` and `ImageHandler`
#[derive(Debug, Default)]
pub struct HandlerSignals {
    /// Emitted at the start of every `start()` call. Advisory: sibling
    /// components contending for the same display should stop. Nobody waits
    /// for or checks the response.
    pub stop_other_activities: Signal<()>,
    /// The source was opened and frames will follow
    pub opened: Signal<()>,
    /// A frame went through the whole transform chain
    pub frame_ready: Signal<Frame>,
    /// The source was closed
    pub closed: Signal<()>,
    /// An operational failure, with a human readable reason
    pub failed: Signal<String>,
}

impl HandlerSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every listener from every category
    pub fn disconnect_all(&self) {
        self.stop_other_activities.disconnect_all();
        self.opened.disconnect_all();
        self.frame_ready.disconnect_all();
        self.closed.disconnect_all();
        self.failed.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let signal = Signal::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            signal.connect(move |value: &u32| log.lock().unwrap().push(format!("{tag}{value}")));
        }

        signal.emit(&7);
        assert_eq!(*log.lock().unwrap(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn test_disconnect() {
        let signal = Signal::<()>::new();
        let hits = Arc::new(AtomicU64::new(0));

        let hits_clone = Arc::clone(&hits);
        let id = signal.connect(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_connect_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let hits = Arc::new(AtomicU64::new(0));

        let signal_clone = Arc::clone(&signal);
        let hits_clone = Arc::clone(&hits);
        signal.connect(move |_| {
            let hits = Arc::clone(&hits_clone);
            signal_clone.connect(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        });

        signal.emit(&());
        // The listener added mid-emit is not part of the running snapshot
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(signal.listener_count(), 2);
    }
}
