// ============================================================================
// spark-collection - Shared Streams
// One upstream run multicast to every subscriber, reference counted
// ============================================================================
//
// The first subscriber connects the source; later subscribers join the
// running connection and see values from that point on. When the last one
// leaves, or the source terminates, the connection is released and the next
// subscriber starts a fresh one.
//
// While connected, the source's observer holds the share, so a connection
// outlives every handle to the stream. It ends when the source terminates or
// when the last subscriber releases its token.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::core::error::StreamError;
use crate::primitives::stream::{EventStream, Observer, Producer};
use crate::primitives::subscription::Subscription;

type Subscribers<T> = Vec<(u64, Rc<dyn Observer<T>>)>;

struct ShareState<T> {
    observers: Subscribers<T>,
    next_id: u64,
    connected: bool,
    /// Bumped every time a connection ends
    epoch: u64,
    connection: Option<Subscription>,
}

struct ShareInner<T> {
    source: EventStream<T>,
    state: RefCell<ShareState<T>>,
    self_weak: Weak<ShareInner<T>>,
}

impl<T: Clone + 'static> ShareInner<T> {
    fn connect(&self) {
        let Some(share) = self.self_weak.upgrade() else {
            return;
        };
        let epoch = {
            let mut state = self.state.borrow_mut();
            state.connected = true;
            state.epoch
        };

        let connection = self.source.subscribe(Rc::new(ShareObserver { share, epoch }));

        let unclaimed = {
            let mut state = self.state.borrow_mut();
            if state.connected && state.epoch == epoch {
                state.connection = Some(connection);
                None
            } else {
                Some(connection)
            }
        };
        if let Some(connection) = unclaimed {
            connection.dispose();
        }
    }

    /// End the current connection and hand back what it still holds.
    fn disconnect(&self) -> Option<Subscription> {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.epoch += 1;
        state.connection.take()
    }

    fn leave(&self, id: u64) {
        let last = {
            let mut state = self.state.borrow_mut();
            state.observers.retain(|(oid, _)| *oid != id);
            state.observers.is_empty() && state.connected
        };
        if !last {
            return;
        }
        if let Some(connection) = self.disconnect() {
            connection.dispose();
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.state.borrow();
        state.connected && state.epoch == epoch
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.state.borrow().observers.iter().any(|(oid, _)| *oid == id)
    }

    /// Detach every subscriber and the connection, for a terminal signal.
    fn finish(&self) -> (Subscribers<T>, Option<Subscription>) {
        let observers = std::mem::take(&mut self.state.borrow_mut().observers);
        (observers, self.disconnect())
    }
}

impl<T: Clone + 'static> Producer<T> for ShareInner<T> {
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        let (id, start) = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, observer));
            (id, !state.connected)
        };
        if start {
            self.connect();
        }

        let weak = self.self_weak.clone();
        Subscription::new(move || {
            if let Some(share) = weak.upgrade() {
                share.leave(id);
            }
        })
    }
}

struct ShareObserver<T> {
    share: Rc<ShareInner<T>>,
    epoch: u64,
}

impl<T: Clone + 'static> Observer<T> for ShareObserver<T> {
    fn next(&self, value: T) {
        if !self.share.is_current(self.epoch) {
            return;
        }
        let observers = self.share.state.borrow().observers.clone();
        for (id, observer) in observers {
            if self.share.is_subscribed(id) {
                observer.next(value.clone());
            }
        }
    }

    fn complete(&self) {
        if !self.share.is_current(self.epoch) {
            return;
        }
        let (observers, connection) = self.share.finish();
        for (_, observer) in observers {
            observer.complete();
        }
        drop(connection);
    }

    fn error(&self, error: StreamError) {
        if !self.share.is_current(self.epoch) {
            return;
        }
        let (observers, connection) = self.share.finish();
        for (_, observer) in observers {
            observer.error(error.clone());
        }
        drop(connection);
    }
}

impl<T: Clone + 'static> EventStream<T> {
    /// Share one run of this stream between every subscriber.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use spark_collection::{EventStream, Subject};
    ///
    /// let subject = Subject::new();
    /// let runs = Rc::new(Cell::new(0));
    /// let counted = {
    ///     let runs = runs.clone();
    ///     subject.stream().map(move |v: i32| {
    ///         runs.set(runs.get() + 1);
    ///         v
    ///     })
    /// };
    /// let shared = counted.share();
    ///
    /// let _a = shared.subscribe_fn(|_| {});
    /// let _b = shared.subscribe_fn(|_| {});
    /// subject.emit(1);
    ///
    /// assert_eq!(runs.get(), 1);
    /// assert_eq!(subject.observer_count(), 1);
    /// ```
    pub fn share(&self) -> EventStream<T> {
        let inner: Rc<ShareInner<T>> = Rc::new_cyclic(|weak| ShareInner {
            source: self.clone(),
            state: RefCell::new(ShareState {
                observers: Vec::new(),
                next_id: 0,
                connected: false,
                epoch: 0,
                connection: None,
            }),
            self_weak: weak.clone(),
        });
        EventStream::from_producer(inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
