// ============================================================================
// spark-collection - Testing Helpers
// Observers that record what a stream delivered, for assertions
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::error::StreamError;
use crate::primitives::stream::Observer;

/// One signal received by an observer.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<T> {
    /// A value.
    Next(T),
    /// Normal termination.
    Complete,
    /// Failure.
    Error(StreamError),
}

/// Observer that keeps every notification it receives.
///
/// # Example
///
/// ```
/// use spark_collection::testing::{Notification, Recorder};
/// use spark_collection::EventStream;
///
/// let recorder = Recorder::new();
/// let _subscription = EventStream::from_iter([1, 2]).subscribe(recorder.observer());
/// assert_eq!(recorder.values(), vec![1, 2]);
/// assert!(recorder.is_complete());
/// assert_eq!(recorder.take().last(), Some(&Notification::Complete));
/// ```
pub struct Recorder<T> {
    log: Rc<RefCell<Vec<Notification<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: 'static> Recorder<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer writing into this recorder.
    pub fn observer(&self) -> Rc<dyn Observer<T>> {
        Rc::new(self.clone())
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Notification<T>> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Number of notifications recorded so far.
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Whether the stream completed normally.
    pub fn is_complete(&self) -> bool {
        self.log
            .borrow()
            .iter()
            .any(|n| matches!(n, Notification::Complete))
    }

    /// The terminal error, if the stream failed.
    pub fn error(&self) -> Option<StreamError> {
        self.log.borrow().iter().find_map(|n| match n {
            Notification::Error(error) => Some(error.clone()),
            _ => None,
        })
    }

    /// Values recorded so far, without draining.
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.log
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::Next(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn next(&self, value: T) {
        self.log.borrow_mut().push(Notification::Next(value));
    }

    fn complete(&self) {
        self.log.borrow_mut().push(Notification::Complete);
    }

    fn error(&self, error: StreamError) {
        self.log.borrow_mut().push(Notification::Error(error));
    }
}
