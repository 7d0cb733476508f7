// ============================================================================
// spark-collection - Subject
// Hot multicast push source driven imperatively
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::error::StreamError;
use crate::primitives::stream::{EventStream, Observer, Producer};
use crate::primitives::subscription::Subscription;

// =============================================================================
// SUBJECT INNER
// =============================================================================

#[derive(Clone)]
enum SubjectState {
    Open,
    Completed,
    Failed(StreamError),
}

struct SubjectInner<T> {
    /// Registered observers, in subscription order
    observers: RefCell<Vec<(u64, Rc<dyn Observer<T>>)>>,

    next_id: Cell<u64>,

    state: RefCell<SubjectState>,

    /// Weak self-reference handed to subscriptions (they must not keep the
    /// subject alive)
    self_weak: Weak<SubjectInner<T>>,
}

impl<T> SubjectInner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.observers.borrow().iter().any(|(oid, _)| *oid == id)
    }

    /// Copy of the observer list so callbacks may (un)subscribe freely.
    fn current(&self) -> Vec<(u64, Rc<dyn Observer<T>>)> {
        self.observers.borrow().clone()
    }

    fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), SubjectState::Open)
    }
}

impl<T: 'static> Producer<T> for SubjectInner<T> {
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        let state = self.state.borrow().clone();
        match state {
            SubjectState::Completed => {
                observer.complete();
                return Subscription::empty();
            }
            SubjectState::Failed(error) => {
                observer.error(error);
                return Subscription::empty();
            }
            SubjectState::Open => {}
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observers.borrow_mut().push((id, observer));

        let weak = self.self_weak.clone();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|(oid, _)| *oid != id);
            }
        })
    }
}

// =============================================================================
// SUBJECT
// =============================================================================

/// A hot, multicast source.
///
/// Every subscriber sees the values emitted after it subscribed. Subscribing
/// after `complete`/`fail` replays only the terminal signal. An observer
/// unsubscribed in the middle of an emission is not delivered to.
///
/// # Example
///
/// ```
/// use spark_collection::testing::Recorder;
/// use spark_collection::Subject;
///
/// let subject = Subject::new();
/// let recorder = Recorder::new();
/// let subscription = subject.stream().subscribe(recorder.observer());
///
/// subject.emit(1);
/// subscription.dispose();
/// subject.emit(2);
///
/// assert_eq!(recorder.values(), vec![1]);
/// ```
pub struct Subject<T> {
    inner: Rc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Create an open subject with no observers.
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|weak| SubjectInner {
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            state: RefCell::new(SubjectState::Open),
            self_weak: weak.clone(),
        });
        Self { inner }
    }

    /// The stream view of this subject. Every call returns the same identity.
    pub fn stream(&self) -> EventStream<T> {
        EventStream::from_producer(self.inner.clone())
    }

    /// Push a value to every current observer.
    pub fn emit(&self, value: T)
    where
        T: Clone,
    {
        if !self.inner.is_open() {
            return;
        }
        for (id, observer) in self.inner.current() {
            if self.inner.is_subscribed(id) {
                observer.next(value.clone());
            }
        }
    }

    /// Complete every current observer and close the subject.
    pub fn complete(&self) {
        if !self.inner.is_open() {
            return;
        }
        *self.inner.state.borrow_mut() = SubjectState::Completed;
        let observers = std::mem::take(&mut *self.inner.observers.borrow_mut());
        for (_, observer) in observers {
            observer.complete();
        }
    }

    /// Fail every current observer and close the subject.
    pub fn fail(&self, error: StreamError) {
        if !self.inner.is_open() {
            return;
        }
        *self.inner.state.borrow_mut() = SubjectState::Failed(error.clone());
        let observers = std::mem::take(&mut *self.inner.observers.borrow_mut());
        for (_, observer) in observers {
            observer.error(error.clone());
        }
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Whether `complete` or `fail` has been called.
    pub fn is_closed(&self) -> bool {
        !self.inner.is_open()
    }
}

// =============================================================================
// TESTS
// =============================================================================
