// Subscription lifecycle: every inner stream is subscribed and released
// exactly once, whatever ends the engine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_collection::testing::Recorder;
use spark_collection::{
    switch_collection, Collection, EventStream, FnObserver, Observer, OutputSelection, Outputs,
    Producer, StreamError, Subject, Subscription, SwitchEvent,
};

// =============================================================================
// Tap: a subject that counts subscribes and releases
// =============================================================================

#[derive(Clone, Default)]
struct Tap {
    subject: Subject<i32>,
    runs: Rc<Cell<u32>>,
    releases: Rc<Cell<u32>>,
    log: Rc<RefCell<Vec<&'static str>>>,
}

struct TapSource(Tap);

impl Producer<i32> for TapSource {
    fn run(&self, observer: Rc<dyn Observer<i32>>) -> Subscription {
        let tap = self.0.clone();
        tap.runs.set(tap.runs.get() + 1);
        tap.log.borrow_mut().push("run");
        let inner = tap.subject.stream().subscribe(observer);
        Subscription::new(move || {
            tap.releases.set(tap.releases.get() + 1);
            tap.log.borrow_mut().push("release");
            inner.dispose();
        })
    }
}

impl Tap {
    fn new() -> Self {
        Self::default()
    }

    fn stream(&self) -> EventStream<i32> {
        EventStream::new(TapSource(self.clone()))
    }

    fn live(&self) -> u32 {
        self.runs.get() - self.releases.get()
    }
}

fn item(stream: &EventStream<i32>) -> Outputs<i32> {
    Outputs::new().with("n", stream.clone())
}

// =============================================================================
// Disposal
// =============================================================================

#[test]
fn test_dispose_releases_everything_once() {
    let versions = Subject::new();
    let (a, b) = (Tap::new(), Tap::new());
    let recorder = Recorder::new();
    let sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(recorder.observer());

    versions.emit(
        Collection::new()
            .with_item(1, item(&a.stream()))
            .with_item(2, item(&b.stream())),
    );
    assert_eq!(a.live() + b.live(), 2);
    assert_eq!(versions.observer_count(), 1);

    sub.dispose();
    assert_eq!((a.runs.get(), a.releases.get()), (1, 1));
    assert_eq!((b.runs.get(), b.releases.get()), (1, 1));
    assert_eq!(versions.observer_count(), 0, "upstream released");

    a.subject.emit(5);
    versions.emit(Collection::new());
    assert_eq!(recorder.len(), 1, "nothing after dispose");
}

#[test]
fn test_dropping_the_token_disposes() {
    let versions = Subject::new();
    let a = Tap::new();
    {
        let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
            .subscribe(Recorder::new().observer());
        versions.emit(Collection::new().with_item(1, item(&a.stream())));
        assert_eq!(a.live(), 1);
    }
    assert_eq!(a.releases.get(), 1);
    assert_eq!(versions.observer_count(), 0);
}

#[test]
fn test_unchanged_handles_are_not_resubscribed() {
    let versions = Subject::new();
    let a = Tap::new();
    let stream = a.stream();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(Recorder::new().observer());

    versions.emit(Collection::new().with_item(1, item(&stream)));
    versions.emit(Collection::new().with_item(1, item(&stream)));
    versions.emit(
        Collection::new()
            .with_item(0, Outputs::new())
            .with_item(1, item(&stream)),
    );

    assert_eq!(a.runs.get(), 1);
    assert_eq!(a.releases.get(), 0);
}

#[test]
fn test_removals_release_before_additions_subscribe() {
    let versions = Subject::new();
    let shared = Tap::new();
    let stream = shared.stream();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(Recorder::new().observer());

    versions.emit(Collection::new().with_item("a", item(&stream)));
    versions.emit(Collection::new().with_item("b", item(&stream)));

    assert_eq!(*shared.log.borrow(), ["run", "release", "run"]);
}

#[test]
fn test_dropped_output_is_released() {
    let versions = Subject::new();
    let (x, y) = (Tap::new(), Tap::new());
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(Recorder::new().observer());

    let both = Outputs::new().with("x", x.stream()).with("y", y.stream());
    versions.emit(Collection::new().with_item(1, both.clone()));
    versions.emit(Collection::new().with_item(1, both.without("y")));

    assert_eq!(x.live(), 1);
    assert_eq!((y.runs.get(), y.releases.get()), (1, 1));
}

// =============================================================================
// Termination
// =============================================================================

#[test]
fn test_upstream_error_tears_down_inners() {
    let versions = Subject::new();
    let a = Tap::new();
    let recorder = Recorder::new();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(recorder.observer());

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    versions.fail(StreamError::new("boom"));

    assert_eq!(recorder.error(), Some(StreamError::new("boom")));
    assert_eq!((a.runs.get(), a.releases.get()), (1, 1));
}

#[test]
fn test_inner_error_fails_the_engine_once() {
    let versions = Subject::new();
    let (a, b) = (Tap::new(), Tap::new());
    let recorder = Recorder::new();
    let sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(recorder.observer());

    versions.emit(
        Collection::new()
            .with_item(1, item(&a.stream()))
            .with_item(2, item(&b.stream())),
    );
    a.subject.fail(StreamError::new("inner"));
    b.subject.fail(StreamError::new("second"));

    assert_eq!(recorder.error(), Some(StreamError::new("inner")));
    assert_eq!(b.releases.get(), 1);
    assert_eq!(versions.observer_count(), 0);

    sub.dispose();
    assert_eq!(a.releases.get() + b.releases.get(), 2, "dispose is idempotent");
}

#[test]
fn test_completion_waits_for_live_inners() {
    let versions = Subject::new();
    let a = Tap::new();
    let recorder = Recorder::new();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(recorder.observer());

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    versions.complete();
    assert!(!recorder.is_complete());

    a.subject.emit(7);
    a.subject.complete();
    assert!(recorder.is_complete());
    assert!(recorder.values()[1].as_data().is_some());
}

#[test]
fn test_completed_inner_is_not_restarted() {
    let versions = Subject::new();
    let a = Tap::new();
    let stream = a.stream();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(Recorder::new().observer());

    versions.emit(Collection::new().with_item(1, item(&stream)));
    a.subject.complete();
    versions.emit(
        Collection::new()
            .with_item(1, item(&stream))
            .with_item(2, Outputs::new()),
    );

    assert_eq!(a.runs.get(), 1);
}

#[test]
fn test_snapshot_completes_with_engine() {
    let versions = Subject::new();
    let recorder = Recorder::new();
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .snapshot()
        .subscribe(recorder.observer());

    versions.emit(Collection::new().with_item(1, item(&EventStream::from_iter([1, 2]))));
    versions.complete();

    let snapshots = recorder.values();
    assert_eq!(snapshots.last().unwrap()[0].value("n"), Some(&2));
    assert!(recorder.is_complete());
}

// =============================================================================
// Re-entrancy
// =============================================================================

#[test]
fn test_version_pushed_from_downstream_is_processed_afterwards() {
    let versions = Subject::new();
    let a = Tap::new();
    let b = Tap::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let replacement = Collection::new().with_item(2, item(&b.stream()));
    let observer = {
        let versions = versions.clone();
        let seen = seen.clone();
        FnObserver::new(move |event: SwitchEvent<i32, i32>| {
            let label = match &event {
                SwitchEvent::Changes(_) => "changes",
                SwitchEvent::Data(_) => "data",
            };
            seen.borrow_mut().push(label);
            if label == "data" {
                versions.emit(replacement.clone());
            }
        })
    };
    let _sub = switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(Rc::new(observer));

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    a.subject.emit(1);

    assert_eq!(*seen.borrow(), ["changes", "data", "changes"]);
    assert_eq!(a.live(), 0);
    assert_eq!(b.live(), 1);
}

// =============================================================================
// Sharing
// =============================================================================

#[test]
fn test_views_share_one_engine() {
    let versions = Subject::new();
    let a = Tap::new();
    let stream = switch_collection(OutputSelection::AllOutputs, versions.stream());

    let changes = Recorder::new();
    let snapshots = Recorder::new();
    let first = stream.change_sets().subscribe(changes.observer());
    let second = stream.snapshot().subscribe(snapshots.observer());

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    assert_eq!(a.runs.get(), 1, "one subscription per (output, item)");
    assert_eq!(versions.observer_count(), 1, "one upstream subscription");

    a.subject.emit(4);
    assert_eq!(changes.len(), 1);
    assert_eq!(snapshots.values()[0][0].value("n"), Some(&4));

    first.dispose();
    assert_eq!(a.live(), 1, "engine stays up while a view remains");
    second.dispose();
    assert_eq!(a.releases.get(), 1);
    assert_eq!(versions.observer_count(), 0);
}

#[test]
fn test_late_view_joins_the_running_engine() {
    let versions = Subject::new();
    let a = Tap::new();
    let stream = switch_collection(OutputSelection::AllOutputs, versions.stream());
    let _events = stream.subscribe(Recorder::new().observer());

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    let late = Recorder::new();
    let _late = stream.events(&OutputSelection::AllOutputs).subscribe(late.observer());
    a.subject.emit(9);

    assert_eq!(a.runs.get(), 1);
    assert_eq!(late.len(), 1);
}

#[test]
fn test_detached_engine_runs_until_upstream_ends() {
    let versions = Subject::new();
    let a = Tap::new();
    let recorder = Recorder::new();
    switch_collection(OutputSelection::AllOutputs, versions.stream())
        .subscribe(recorder.observer())
        .detach();

    versions.emit(Collection::new().with_item(1, item(&a.stream())));
    assert_eq!(recorder.len(), 1, "structural event after detach");
    assert_eq!(a.live(), 1);

    a.subject.emit(3);
    assert_eq!(recorder.len(), 2);

    versions.complete();
    a.subject.complete();
    assert!(recorder.is_complete());
    assert_eq!(a.releases.get(), 1);
    assert_eq!(versions.observer_count(), 0);
}
