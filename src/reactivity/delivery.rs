// ============================================================================
// spark-collection - Delivery Queue
// Serializes every inbound signal of one engine instance
// ============================================================================
//
// Producers are free to push synchronously from inside `run`, and downstream
// observers are free to feed values back into an engine's sources. Either
// would re-enter an engine halfway through a reconciliation. Every entry
// point therefore goes through a DeliveryQueue: the first delivery drains
// the queue, deliveries that arrive while it is draining are appended and
// handled afterwards, in arrival order.
//
// The handler is called with no borrow of the queue held.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Trampoline that runs a handler for one message at a time.
///
/// # Example
///
/// ```
/// use spark_collection::DeliveryQueue;
/// use std::cell::RefCell;
///
/// let queue = DeliveryQueue::new();
/// let seen = RefCell::new(Vec::new());
///
/// fn handle(queue: &DeliveryQueue<u32>, seen: &RefCell<Vec<u32>>, n: u32) {
///     seen.borrow_mut().push(n);
///     if n < 3 {
///         // Re-entrant delivery is queued, not nested.
///         queue.deliver(n + 1, |m| handle(queue, seen, m));
///         seen.borrow_mut().push(100 + n);
///     }
/// }
///
/// queue.deliver(1, |m| handle(&queue, &seen, m));
/// assert_eq!(*seen.borrow(), [1, 101, 2, 102, 3]);
/// ```
pub struct DeliveryQueue<M> {
    queue: RefCell<VecDeque<M>>,
    draining: Cell<bool>,
}

impl<M> Default for DeliveryQueue<M> {
    fn default() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }
}

impl<M> DeliveryQueue<M> {
    /// Empty, idle queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `message`. If no drain is in progress, drain the queue through
    /// `handler` before returning.
    pub fn deliver(&self, message: M, mut handler: impl FnMut(M)) {
        self.queue.borrow_mut().push_back(message);
        if self.draining.get() {
            return;
        }

        // Reset the flag even if the handler unwinds
        struct DrainGuard<'a>(&'a Cell<bool>);

        impl Drop for DrainGuard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        self.draining.set(true);
        let _guard = DrainGuard(&self.draining);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(message) => handler(message),
                None => break,
            }
        }
    }

    /// Queue `message` for the drain in progress.
    ///
    /// Only meaningful from inside a handler; otherwise the message waits for
    /// the next `deliver`.
    pub fn defer(&self, message: M) {
        self.queue.borrow_mut().push_back(message);
    }

    /// Drop every queued message.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.queue.borrow_mut());
        drop(dropped);
    }

    /// Whether a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    /// Messages waiting to be handled.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
