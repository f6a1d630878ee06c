//! Observer registry for command state notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use super::CommandStateChanged;

/// Handle returned by [`add_observer`](super::InputEngine::add_observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

type Callback<C> = Arc<dyn Fn(&CommandStateChanged<C>) + Send + Sync>;

/// Registered callbacks and channel subscribers.
pub(crate) struct Observers<C> {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(ObserverId, Callback<C>)>>,
    subscribers: Mutex<Vec<Sender<CommandStateChanged<C>>>>,
}

impl<C: Clone> Observers<C> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&CommandStateChanged<C>) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub(crate) fn subscribe(&self) -> Receiver<CommandStateChanged<C>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Delivers `events` in order. Callbacks run on the calling thread
    /// against a snapshot of the registry, so they may add or remove
    /// observers (or detach the engine) without deadlocking.
    pub(crate) fn emit(&self, events: Vec<CommandStateChanged<C>>) {
        if events.is_empty() {
            return;
        }

        let callbacks: Vec<Callback<C>> = self
            .callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for event in &events {
            for callback in &callbacks {
                callback(event);
            }
        }

        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        for event in events {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.read().len()
    }
}
