//! Blocking hand-off queue with permanent cancellation.
//!
//! Used to move recorded gestures from the polling thread to the thread that
//! runs the recorder callback. Once cancelled the queue stays cancelled:
//! [`InputEngine::detach`](crate::InputEngine::detach) relies on that to join
//! the delivery thread exactly once.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    cancelled: bool,
}

/// Multi-producer blocking queue whose consumers can be released with
/// [`cancel`](HandoffQueue::cancel).
pub struct HandoffQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> HandoffQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                cancelled: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item. Never blocks on consumers.
    ///
    /// Items enqueued after cancellation are dropped.
    pub fn enqueue(&self, item: T) {
        let mut state = self.state.lock();
        if state.cancelled {
            return;
        }
        state.items.push_back(item);

        if state.items.len() == 1 {
            self.available.notify_all();
        }
    }

    /// Blocks until an item is available or the queue is cancelled.
    ///
    /// Returns `None` once cancelled, for every current and future caller.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();

        while !state.cancelled && state.items.is_empty() {
            self.available.wait(&mut state);
        }

        if state.cancelled {
            return None;
        }

        state.items.pop_front()
    }

    /// Cancels the queue, drops pending items and wakes every blocked
    /// consumer. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.items.clear();
        self.available.notify_all();
    }

    /// Drops all pending items. Cancellation is left untouched.
    pub fn clear(&self) {
        self.state.lock().items.clear();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
