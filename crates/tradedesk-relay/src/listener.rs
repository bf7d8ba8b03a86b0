//! Listener registry for feed fan-out.

use crate::message::FeedMessage;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// Callback invoked for every parsed feed message.
pub type Listener = Arc<dyn Fn(&FeedMessage) + Send + Sync>;

/// Handle returned by registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Ordered set of listeners.
///
/// Delivery order is registration order. A listener that panics is logged
/// and skipped; the remaining listeners still receive the message.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Deregister a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `message` to every listener.
    ///
    /// Listeners are snapshotted first, so a callback may add or remove
    /// listeners without deadlocking. Returns the number of listeners that
    /// panicked.
    pub fn dispatch(&self, message: &FeedMessage) -> usize {
        let snapshot: Vec<(ListenerId, Listener)> = self.listeners.read().clone();
        let mut panicked = 0;

        for (id, listener) in snapshot {
            trace!(listener = id.value(), "Dispatching feed message");
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                error!(listener = id.value(), "Listener panicked, continuing fan-out");
                panicked += 1;
            }
        }

        panicked
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}
