// ============================================================================
// spark-collection - Stream Operators
// Cold, stateless transforms used to decompose engine output
// ============================================================================

use std::rc::Rc;

use crate::core::error::StreamError;
use crate::primitives::stream::{EventStream, Observer, Producer};
use crate::primitives::subscription::Subscription;

struct FlatMapIter<S, F> {
    source: EventStream<S>,
    f: Rc<F>,
}

struct FlatMapObserver<F, T> {
    f: Rc<F>,
    downstream: Rc<dyn Observer<T>>,
}

impl<S, T, I, F> Producer<T> for FlatMapIter<S, F>
where
    S: 'static,
    T: 'static,
    I: IntoIterator<Item = T>,
    F: Fn(S) -> I + 'static,
{
    fn run(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        self.source.subscribe(Rc::new(FlatMapObserver {
            f: self.f.clone(),
            downstream: observer,
        }))
    }
}

impl<S, T, I, F> Observer<S> for FlatMapObserver<F, T>
where
    I: IntoIterator<Item = T>,
    F: Fn(S) -> I,
{
    fn next(&self, value: S) {
        for out in (self.f)(value) {
            self.downstream.next(out);
        }
    }

    fn complete(&self) {
        self.downstream.complete();
    }

    fn error(&self, error: StreamError) {
        self.downstream.error(error);
    }
}

impl<S: 'static> EventStream<S> {
    /// Replace every value by zero or more values.
    pub fn flat_map_iter<T, I, F>(&self, f: F) -> EventStream<T>
    where
        T: 'static,
        I: IntoIterator<Item = T>,
        F: Fn(S) -> I + 'static,
    {
        EventStream::new(FlatMapIter {
            source: self.clone(),
            f: Rc::new(f),
        })
    }

    /// Transform and filter in one step.
    pub fn filter_map<T, F>(&self, f: F) -> EventStream<T>
    where
        T: 'static,
        F: Fn(S) -> Option<T> + 'static,
    {
        self.flat_map_iter(f)
    }

    /// Transform every value.
    pub fn map<T, F>(&self, f: F) -> EventStream<T>
    where
        T: 'static,
        F: Fn(S) -> T + 'static,
    {
        self.flat_map_iter(move |value| std::iter::once(f(value)))
    }

    /// Keep values matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> EventStream<S>
    where
        F: Fn(&S) -> bool + 'static,
    {
        self.filter_map(move |value| predicate(&value).then_some(value))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Notification, Recorder};
    use crate::primitives::subject::Subject;

    #[test]
    fn map_filter_chain() {
        let recorder = Recorder::new();
        let _sub = EventStream::from_iter(1..=6)
            .filter(|v| v % 2 == 0)
            .map(|v| v * 10)
            .subscribe(recorder.observer());
        assert_eq!(recorder.values(), vec![20, 40, 60]);
        assert!(recorder.is_complete());
    }

    #[test]
    fn flat_map_iter_expands() {
        let recorder = Recorder::new();
        let _sub = EventStream::from_iter([2usize, 0, 1])
            .flat_map_iter(|n| std::iter::repeat('x').take(n))
            .subscribe(recorder.observer());
        assert_eq!(recorder.values(), vec!['x', 'x', 'x']);
    }

    #[test]
    fn errors_and_disposal_pass_through() {
        let subject = Subject::new();
        let recorder = Recorder::new();
        let sub = subject.stream().map(|v: i32| v + 1).subscribe(recorder.observer());
        subject.emit(1);
        assert_eq!(subject.observer_count(), 1);
        sub.dispose();
        assert_eq!(subject.observer_count(), 0);

        let _sub = subject.stream().map(|v: i32| v).subscribe(recorder.observer());
        subject.fail(StreamError::new("bad"));
        assert_eq!(
            recorder.take(),
            vec![
                Notification::Next(2),
                Notification::Error(StreamError::new("bad"))
            ]
        );
    }
}
