// ============================================================================
// spark-collection - Event Streams
// The push-based sequence abstraction every engine consumes and produces
// ============================================================================
//
// A Producer pushes values into an Observer until it completes or fails.
// EventStream is the cheap-clone handle over a producer; its identity (not
// its values) is what the diff engine compares, so two handles are "the same
// stream" only if they share one producer allocation.
//
// Delivery is single-threaded and synchronous: producers call observers
// directly, possibly from inside `run`.
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::error::StreamError;
use crate::primitives::subscription::Subscription;

// =============================================================================
// OBSERVER / PRODUCER
// =============================================================================

/// Receiver side of a stream.
///
/// After `complete` or `error` no further calls are made.
pub trait Observer<T> {
    /// A new value.
    fn next(&self, value: T);

    /// The stream finished normally.
    fn complete(&self);

    /// The stream failed; this is terminal.
    fn error(&self, error: StreamError);
}

/// Source side of a stream.
pub trait Producer<T> {
    /// Start delivering to `observer`. The returned subscription stops it.
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription;
}

// =============================================================================
// EVENT STREAM
// =============================================================================

/// Identity-comparable handle to a producer.
///
/// Clones compare equal; separately constructed streams never do, even if
/// they would emit identical values.
///
/// # Example
///
/// ```
/// use spark_collection::EventStream;
///
/// let a = EventStream::just(1);
/// let b = a.clone();
/// assert!(a.ptr_eq(&b));
/// assert!(!a.ptr_eq(&EventStream::just(1)));
/// ```
pub struct EventStream<T> {
    producer: Rc<dyn Producer<T>>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T> PartialEq for EventStream<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for EventStream<T> {}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventStream({:#x})", self.id())
    }
}

impl<T: 'static> EventStream<T> {
    /// Wrap a producer.
    pub fn new(producer: impl Producer<T> + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// Wrap an already shared producer. Streams built from the same `Rc`
    /// compare equal.
    pub fn from_producer(producer: Rc<dyn Producer<T>>) -> Self {
        Self { producer }
    }

    /// Start a run delivering to `observer`.
    pub fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        self.producer.run(observer)
    }

    /// Start a run that only cares about values.
    pub fn subscribe_fn(&self, next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe(Rc::new(FnObserver::new(next)))
    }

    /// Emits `value` once, then completes.
    pub fn just(value: T) -> Self
    where
        T: Clone,
    {
        Self::from_iter([value])
    }

    /// Emits every element in order, then completes.
    pub fn from_iter(values: impl IntoIterator<Item = T>) -> Self
    where
        T: Clone,
    {
        Self::new(Sequence {
            values: values.into_iter().collect(),
        })
    }

    /// Completes immediately.
    pub fn empty() -> Self {
        Self::new(Terminal::Complete)
    }

    /// Fails immediately with `error`.
    pub fn failed(error: StreamError) -> Self {
        Self::new(Terminal::Fail(error))
    }

    /// Never emits and never terminates.
    pub fn never() -> Self {
        Self::new(Terminal::Never)
    }
}

impl<T> EventStream<T> {
    /// Whether both handles share one producer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.producer), Rc::as_ptr(&other.producer))
    }

    /// Address of the producer, for diagnostics.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.producer).cast::<()>() as usize
    }
}

// =============================================================================
// BUILT-IN PRODUCERS
// =============================================================================

struct Sequence<T> {
    values: Vec<T>,
}

impl<T: Clone> Producer<T> for Sequence<T> {
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        for value in &self.values {
            observer.next(value.clone());
        }
        observer.complete();
        Subscription::empty()
    }
}

enum Terminal {
    Complete,
    Fail(StreamError),
    Never,
}

impl<T> Producer<T> for Terminal {
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        match self {
            Terminal::Complete => observer.complete(),
            Terminal::Fail(error) => observer.error(error.clone()),
            Terminal::Never => {}
        }
        Subscription::empty()
    }
}

// =============================================================================
// CLOSURE OBSERVER
// =============================================================================

type NextFn<T> = Box<dyn Fn(T)>;
type CompleteFn = Box<dyn Fn()>;
type ErrorFn = Box<dyn Fn(StreamError)>;

/// Observer assembled from closures. Missing handlers ignore the signal.
pub struct FnObserver<T> {
    next: NextFn<T>,
    complete: Option<CompleteFn>,
    error: Option<ErrorFn>,
}

impl<T> FnObserver<T> {
    /// Observer with a value handler.
    pub fn new(next: impl Fn(T) + 'static) -> Self {
        Self {
            next: Box::new(next),
            complete: None,
            error: None,
        }
    }

    /// Add a completion handler.
    pub fn on_complete(mut self, complete: impl Fn() + 'static) -> Self {
        self.complete = Some(Box::new(complete));
        self
    }

    /// Add an error handler.
    pub fn on_error(mut self, error: impl Fn(StreamError) + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }
}

impl<T> Observer<T> for FnObserver<T> {
    fn next(&self, value: T) {
        (self.next)(value);
    }

    fn complete(&self) {
        if let Some(complete) = &self.complete {
            complete();
        }
    }

    fn error(&self, error: StreamError) {
        if let Some(on_error) = &self.error {
            on_error(error);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
