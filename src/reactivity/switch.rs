// ============================================================================
// spark-collection - Switch Engine
// Keeps one live subscription per (output, item) across collection versions
// ============================================================================
//
// Every version received from upstream is diffed against the previous one.
// The structural change is re-emitted first, then the subscription table is
// reconciled: removed items are disposed before added items are activated,
// and an output whose stream identity did not change is left running.
//
// The table is an arena keyed by (output name, item key). Inner observers
// only hold a weak engine reference plus that key and a serial number, so a
// late event from a retired subscription is recognised and dropped.
//
// Completion waits for upstream to end AND every live inner to finish. The
// first error from anywhere terminates the engine.
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::collections::collection::Collection;
use crate::collections::diff::{diff, Diff, ItemDelta, ItemEntry};
use crate::core::error::StreamError;
use crate::core::types::{Emitted, ItemKey, OutputName, OutputSelection};
use crate::macros::{log_debug, log_trace};
use crate::primitives::stream::{EventStream, Observer, Producer};
use crate::primitives::subscription::Subscription;
use crate::reactivity::delivery::DeliveryQueue;

// =============================================================================
// EVENTS
// =============================================================================

/// A collection version together with the diff that produced it.
///
/// `diff` is `None` when the version is structurally identical to the
/// previous one (for the first version, identical to an empty collection).
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet<K, V> {
    pub collection: Collection<K, V>,
    pub diff: Option<Rc<Diff<K, V>>>,
}

/// A value forwarded from one tracked (item, output) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct DataEvent<K, V> {
    pub key: K,
    pub output: OutputName,
    pub value: Emitted<V>,
}

/// Everything a switch engine emits, in delivery order.
#[derive(Clone, Debug, PartialEq)]
pub enum SwitchEvent<K, V> {
    /// A new collection version arrived.
    Changes(ChangeSet<K, V>),
    /// A tracked output produced a value.
    Data(DataEvent<K, V>),
}

impl<K, V> SwitchEvent<K, V> {
    /// The structural part, if this is one.
    pub fn as_changes(&self) -> Option<&ChangeSet<K, V>> {
        match self {
            Self::Changes(changes) => Some(changes),
            Self::Data(_) => None,
        }
    }

    /// The data part, if this is one.
    pub fn as_data(&self) -> Option<&DataEvent<K, V>> {
        match self {
            Self::Data(data) => Some(data),
            Self::Changes(_) => None,
        }
    }
}

/// One item's share of a change set.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemChange<K, V> {
    Added {
        collection: Collection<K, V>,
        key: K,
        entry: ItemEntry<V>,
    },
    Removed {
        collection: Collection<K, V>,
        key: K,
        entry: ItemEntry<V>,
    },
    Changed {
        collection: Collection<K, V>,
        key: K,
        delta: ItemDelta<V>,
    },
}

impl<K, V> ItemChange<K, V> {
    /// Key of the item concerned.
    pub fn key(&self) -> &K {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Changed { key, .. } => key,
        }
    }

    /// The version this change belongs to.
    pub fn collection(&self) -> &Collection<K, V> {
        match self {
            Self::Added { collection, .. }
            | Self::Removed { collection, .. }
            | Self::Changed { collection, .. } => collection,
        }
    }
}

// =============================================================================
// TRACKED SUBSCRIPTIONS
// =============================================================================

/// What a tracked pair is subscribed to.
enum Source<V> {
    Stream(EventStream<V>),
    /// Stand-in for a selected output the item lacks: reports `Absent` once,
    /// then ends. All placeholders are the same source.
    Placeholder,
}

impl<V> Clone for Source<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Stream(stream) => Self::Stream(stream.clone()),
            Self::Placeholder => Self::Placeholder,
        }
    }
}

impl<V> Source<V> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Stream(a), Self::Stream(b)) => a.ptr_eq(b),
            (Self::Placeholder, Self::Placeholder) => true,
            _ => false,
        }
    }
}

struct Tracked<V> {
    source: Source<V>,
    serial: u64,
    /// False once the inner stream has ended
    active: bool,
    /// None until `subscribe` returns, and again once released
    subscription: Option<Subscription>,
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    /// Completed or failed downstream
    Finished,
    /// Released by the subscriber
    Disposed,
}

struct EngineState<K, V> {
    baseline: Collection<K, V>,
    tracked: HashMap<(OutputName, K), Tracked<V>>,
    next_serial: u64,
    live: usize,
    ended: bool,
    phase: Phase,
    upstream: Option<Subscription>,
}

enum Inbound<K, V> {
    Version(Collection<K, V>),
    VersionsEnded,
    VersionsFailed(StreamError),
    Next {
        output: OutputName,
        key: K,
        serial: u64,
        value: Emitted<V>,
    },
    Ended {
        output: OutputName,
        key: K,
        serial: u64,
    },
    Failed {
        output: OutputName,
        key: K,
        serial: u64,
        error: StreamError,
    },
}

struct SwitchEngine<K, V> {
    selection: OutputSelection,
    downstream: Rc<dyn Observer<SwitchEvent<K, V>>>,
    state: RefCell<EngineState<K, V>>,
    queue: DeliveryQueue<Inbound<K, V>>,
    self_weak: Weak<SwitchEngine<K, V>>,
}

impl<K: ItemKey, V: 'static> SwitchEngine<K, V> {
    fn new(
        selection: OutputSelection,
        downstream: Rc<dyn Observer<SwitchEvent<K, V>>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            selection,
            downstream,
            state: RefCell::new(EngineState {
                baseline: Collection::new(),
                tracked: HashMap::new(),
                next_serial: 0,
                live: 0,
                ended: false,
                phase: Phase::Running,
                upstream: None,
            }),
            queue: DeliveryQueue::new(),
            self_weak: weak.clone(),
        })
    }

    fn start(&self, versions: &EventStream<Collection<K, V>>) {
        let subscription = versions.subscribe(Rc::new(VersionObserver {
            engine: self.self_weak.clone(),
        }));
        let mut state = self.state.borrow_mut();
        if state.phase == Phase::Running {
            state.upstream = Some(subscription);
        } else {
            drop(state);
            subscription.dispose();
        }
    }

    fn is_running(&self) -> bool {
        self.state.borrow().phase == Phase::Running
    }

    fn deliver(&self, message: Inbound<K, V>) {
        self.queue.deliver(message, |message| self.handle(message));
    }

    fn handle(&self, message: Inbound<K, V>) {
        if !self.is_running() {
            return;
        }
        match message {
            Inbound::Version(collection) => self.on_version(collection),
            Inbound::VersionsEnded => self.on_versions_ended(),
            Inbound::VersionsFailed(error) => self.fail(error),
            Inbound::Next {
                output,
                key,
                serial,
                value,
            } => {
                if self.is_current(&output, &key, serial) {
                    self.downstream
                        .next(SwitchEvent::Data(DataEvent { key, output, value }));
                }
            }
            Inbound::Ended {
                output,
                key,
                serial,
            } => self.on_inner_ended(output, key, serial),
            Inbound::Failed {
                output,
                key,
                serial,
                error,
            } => {
                if self.is_current(&output, &key, serial) {
                    self.fail(error);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Upstream
    // -------------------------------------------------------------------------

    fn on_version(&self, collection: Collection<K, V>) {
        let changes = {
            let mut state = self.state.borrow_mut();
            let changes = if state.baseline.same_version(&collection) {
                None
            } else {
                diff(&self.selection, &state.baseline, &collection).map(Rc::new)
            };
            state.baseline = collection.clone();
            changes
        };

        if let Some(_d) = &changes {
            log_debug!(
                items = collection.len(),
                added = _d.added.len(),
                removed = _d.removed.len(),
                changed = _d.changed.len(),
                "reconciling collection version"
            );
        } else {
            log_trace!(items = collection.len(), "collection version unchanged");
        }

        self.downstream.next(SwitchEvent::Changes(ChangeSet {
            collection,
            diff: changes.clone(),
        }));

        if let Some(d) = changes {
            self.apply(&d);
        }
    }

    fn apply(&self, diff: &Diff<K, V>) {
        match &self.selection {
            OutputSelection::NamedOutputs(names) => {
                for key in diff.removed.keys() {
                    for name in names {
                        self.retire(name, key);
                    }
                }
                for key in diff.added.keys() {
                    for name in names {
                        self.track(name, key);
                    }
                }
                for key in diff.changed.keys() {
                    for name in names {
                        self.refresh(name, key);
                    }
                }
            }
            OutputSelection::AllOutputs => {
                for (key, entry) in diff.removed.iter() {
                    for name in entry.outputs.names() {
                        self.retire(name, key);
                    }
                }
                for (key, entry) in diff.added.iter() {
                    for name in entry.outputs.names() {
                        self.track(name, key);
                    }
                }
                for (key, delta) in diff.changed.iter() {
                    for (name, stream) in &delta.outputs {
                        match stream {
                            Some(_) => self.refresh(name, key),
                            None => self.retire(name, key),
                        }
                    }
                }
            }
        }
    }

    fn on_versions_ended(&self) {
        let upstream = {
            let mut state = self.state.borrow_mut();
            state.ended = true;
            state.upstream.take()
        };
        if let Some(subscription) = upstream {
            subscription.dispose();
        }
        log_debug!("collection versions ended");
        self.try_complete();
    }

    // -------------------------------------------------------------------------
    // Subscription table
    // -------------------------------------------------------------------------

    /// The source the current version holds for `output` of `key`.
    fn source_for(&self, output: &OutputName, key: &K) -> Source<V> {
        let state = self.state.borrow();
        match state
            .baseline
            .get(key)
            .and_then(|outputs| outputs.get(output.as_str()))
        {
            Some(stream) => Source::Stream(stream.clone()),
            None => Source::Placeholder,
        }
    }

    fn is_current(&self, output: &OutputName, key: &K, serial: u64) -> bool {
        self.state
            .borrow()
            .tracked
            .get(&(output.clone(), key.clone()))
            .is_some_and(|tracked| tracked.serial == serial && tracked.active)
    }

    fn retire(&self, output: &OutputName, key: &K) {
        let removed = {
            let mut state = self.state.borrow_mut();
            if state.phase != Phase::Running {
                return;
            }
            let removed = state.tracked.remove(&(output.clone(), key.clone()));
            if removed.as_ref().is_some_and(|tracked| tracked.active) {
                state.live -= 1;
            }
            removed
        };
        if let Some(tracked) = removed {
            log_trace!(output = %output, key = ?key, serial = tracked.serial, "retired subscription");
            if let Some(subscription) = tracked.subscription {
                subscription.dispose();
            }
        }
    }

    fn track(&self, output: &OutputName, key: &K) {
        let exists = self
            .state
            .borrow()
            .tracked
            .contains_key(&(output.clone(), key.clone()));
        if exists {
            self.refresh(output, key);
        } else if self.is_running() {
            let source = self.source_for(output, key);
            self.activate(output, key, source);
        }
    }

    fn refresh(&self, output: &OutputName, key: &K) {
        let source = self.source_for(output, key);
        let replaced = {
            let mut state = self.state.borrow_mut();
            if state.phase != Phase::Running {
                return;
            }
            let slot = (output.clone(), key.clone());
            match state.tracked.get(&slot).map(|tracked| tracked.source.same(&source)) {
                Some(true) => return,
                Some(false) => {
                    let replaced = state.tracked.remove(&slot);
                    if replaced.as_ref().is_some_and(|tracked| tracked.active) {
                        state.live -= 1;
                    }
                    replaced
                }
                None => None,
            }
        };
        if let Some(tracked) = replaced {
            log_trace!(output = %output, key = ?key, serial = tracked.serial, "replacing subscription");
            if let Some(subscription) = tracked.subscription {
                subscription.dispose();
            }
        }
        self.activate(output, key, source);
    }

    fn activate(&self, output: &OutputName, key: &K, source: Source<V>) {
        let serial = {
            let mut state = self.state.borrow_mut();
            if state.phase != Phase::Running {
                return;
            }
            let serial = state.next_serial;
            state.next_serial += 1;
            state.live += 1;
            state.tracked.insert(
                (output.clone(), key.clone()),
                Tracked {
                    source: source.clone(),
                    serial,
                    active: true,
                    subscription: None,
                },
            );
            serial
        };
        log_trace!(output = %output, key = ?key, serial, "activating subscription");

        let subscription = match &source {
            Source::Stream(stream) => stream.subscribe(Rc::new(InnerObserver {
                engine: self.self_weak.clone(),
                output: output.clone(),
                key: key.clone(),
                serial,
            })),
            Source::Placeholder => {
                self.queue.defer(Inbound::Next {
                    output: output.clone(),
                    key: key.clone(),
                    serial,
                    value: Emitted::Absent,
                });
                self.queue.defer(Inbound::Ended {
                    output: output.clone(),
                    key: key.clone(),
                    serial,
                });
                Subscription::empty()
            }
        };

        let unclaimed = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let running = state.phase == Phase::Running;
            match state.tracked.get_mut(&(output.clone(), key.clone())) {
                Some(tracked) if running && tracked.serial == serial => {
                    tracked.subscription = Some(subscription);
                    None
                }
                _ => Some(subscription),
            }
        };
        if let Some(subscription) = unclaimed {
            subscription.dispose();
        }
    }

    fn on_inner_ended(&self, output: OutputName, key: K, serial: u64) {
        let finished = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            match state.tracked.get_mut(&(output, key)) {
                Some(tracked) if tracked.serial == serial && tracked.active => {
                    tracked.active = false;
                    state.live -= 1;
                    tracked.subscription.take()
                }
                _ => return,
            }
        };
        if let Some(subscription) = finished {
            subscription.dispose();
        }
        self.try_complete();
    }

    // -------------------------------------------------------------------------
    // Termination
    // -------------------------------------------------------------------------

    fn try_complete(&self) {
        let done = {
            let state = self.state.borrow();
            state.phase == Phase::Running && state.ended && state.live == 0
        };
        if !done {
            return;
        }
        log_debug!("switch engine completed");
        let resources = self.terminate(Phase::Finished);
        self.downstream.complete();
        release(resources);
    }

    fn fail(&self, error: StreamError) {
        log_debug!(error = %error, "switch engine failed");
        let resources = self.terminate(Phase::Finished);
        self.downstream.error(error);
        release(resources);
    }

    fn dispose(&self) {
        if self.state.borrow().phase != Phase::Running {
            return;
        }
        let resources = self.terminate(Phase::Disposed);
        log_debug!(released = resources.len(), "switch engine disposed");
        release(resources);
    }

    /// Enter `phase` and hand back every resource still held.
    fn terminate(&self, phase: Phase) -> Vec<Subscription> {
        self.queue.clear();
        let mut state = self.state.borrow_mut();
        state.phase = phase;
        state.live = 0;
        let mut resources: Vec<Subscription> = state
            .tracked
            .drain()
            .filter_map(|(_, tracked)| tracked.subscription)
            .collect();
        resources.extend(state.upstream.take());
        resources
    }
}

fn release(resources: Vec<Subscription>) {
    for subscription in resources {
        subscription.dispose();
    }
}

// =============================================================================
// OBSERVERS
// =============================================================================

struct VersionObserver<K, V> {
    engine: Weak<SwitchEngine<K, V>>,
}

impl<K: ItemKey, V: 'static> Observer<Collection<K, V>> for VersionObserver<K, V> {
    fn next(&self, collection: Collection<K, V>) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::Version(collection));
        }
    }

    fn complete(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::VersionsEnded);
        }
    }

    fn error(&self, error: StreamError) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::VersionsFailed(error));
        }
    }
}

struct InnerObserver<K, V> {
    engine: Weak<SwitchEngine<K, V>>,
    output: OutputName,
    key: K,
    serial: u64,
}

impl<K: ItemKey, V: 'static> Observer<V> for InnerObserver<K, V> {
    fn next(&self, value: V) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::Next {
                output: self.output.clone(),
                key: self.key.clone(),
                serial: self.serial,
                value: Emitted::Value(value),
            });
        }
    }

    fn complete(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::Ended {
                output: self.output.clone(),
                key: self.key.clone(),
                serial: self.serial,
            });
        }
    }

    fn error(&self, error: StreamError) {
        if let Some(engine) = self.engine.upgrade() {
            engine.deliver(Inbound::Failed {
                output: self.output.clone(),
                key: self.key.clone(),
                serial: self.serial,
                error,
            });
        }
    }
}

// =============================================================================
// COLLECTION STREAM
// =============================================================================

struct SwitchSource<K, V> {
    selection: OutputSelection,
    versions: EventStream<Collection<K, V>>,
}

impl<K: ItemKey, V: 'static> Producer<SwitchEvent<K, V>> for SwitchSource<K, V> {
    fn run(&self, observer: Rc<dyn Observer<SwitchEvent<K, V>>>) -> Subscription {
        let engine = SwitchEngine::new(self.selection.clone(), observer);
        engine.start(&self.versions);
        Subscription::new(move || engine.dispose())
    }
}

/// Track the outputs of every item across a stream of collection versions.
///
/// Every subscriber, and every view derived from the returned stream, shares
/// one engine and one upstream subscription. The engine starts with the
/// first subscriber and is released when the last one leaves; a subscriber
/// joining a running engine sees events from that point on.
///
/// # Example
///
/// ```
/// use spark_collection::testing::Recorder;
/// use spark_collection::{
///     switch_collection, Collection, DataEvent, Emitted, OutputSelection, Outputs, Subject,
///     SwitchEvent,
/// };
///
/// let versions = Subject::new();
/// let foo = Subject::new();
/// let events = switch_collection(OutputSelection::AllOutputs, versions.stream());
///
/// let recorder = Recorder::new();
/// let _subscription = events.subscribe(recorder.observer());
///
/// versions.emit(Collection::new().with_item("a", Outputs::new().with("foo", foo.stream())));
/// foo.emit(7);
///
/// let log = recorder.values();
/// assert!(matches!(log[0], SwitchEvent::Changes(_)));
/// assert_eq!(
///     log[1],
///     SwitchEvent::Data(DataEvent { key: "a", output: "foo".into(), value: Emitted::Value(7) })
/// );
/// ```
pub fn switch_collection<K: ItemKey, V: Clone + 'static>(
    selection: OutputSelection,
    versions: EventStream<Collection<K, V>>,
) -> CollectionStream<K, V> {
    let engine = EventStream::new(SwitchSource {
        selection: selection.clone(),
        versions,
    });
    CollectionStream {
        stream: engine.share(),
        selection,
    }
}

/// The engine's combined output, with views that decompose it.
pub struct CollectionStream<K, V> {
    selection: OutputSelection,
    stream: EventStream<SwitchEvent<K, V>>,
}

impl<K, V> Clone for CollectionStream<K, V> {
    fn clone(&self) -> Self {
        Self {
            selection: self.selection.clone(),
            stream: self.stream.clone(),
        }
    }
}

impl<K: ItemKey, V: Clone + 'static> CollectionStream<K, V> {
    /// The outputs this stream tracks.
    pub fn selection(&self) -> &OutputSelection {
        &self.selection
    }

    /// The interleaved structural and data events.
    pub fn stream(&self) -> &EventStream<SwitchEvent<K, V>> {
        &self.stream
    }

    pub fn into_stream(self) -> EventStream<SwitchEvent<K, V>> {
        self.stream
    }

    /// Deliver the engine's events to `observer`, starting the engine if
    /// nothing else is subscribed.
    pub fn subscribe(&self, observer: Rc<dyn Observer<SwitchEvent<K, V>>>) -> Subscription {
        self.stream.subscribe(observer)
    }

    /// Structural events only.
    pub fn change_sets(&self) -> EventStream<ChangeSet<K, V>> {
        self.stream.filter_map(|event| match event {
            SwitchEvent::Changes(changes) => Some(changes),
            SwitchEvent::Data(_) => None,
        })
    }

    /// One notification per changed, removed and added item, in that order.
    pub fn changes(&self) -> EventStream<ItemChange<K, V>> {
        self.change_sets().flat_map_iter(|changes| {
            let ChangeSet { collection, diff } = changes;
            let mut items = Vec::new();
            if let Some(diff) = diff {
                for (key, delta) in diff.changed.iter() {
                    items.push(ItemChange::Changed {
                        collection: collection.clone(),
                        key: key.clone(),
                        delta: delta.clone(),
                    });
                }
                for (key, entry) in diff.removed.iter() {
                    items.push(ItemChange::Removed {
                        collection: collection.clone(),
                        key: key.clone(),
                        entry: entry.clone(),
                    });
                }
                for (key, entry) in diff.added.iter() {
                    items.push(ItemChange::Added {
                        collection: collection.clone(),
                        key: key.clone(),
                        entry: entry.clone(),
                    });
                }
            }
            items
        })
    }

    /// Data events whose output passes `selection`.
    pub fn events(&self, selection: &OutputSelection) -> EventStream<DataEvent<K, V>> {
        let selection = selection.clone();
        self.stream.filter_map(move |event| match event {
            SwitchEvent::Data(data) if selection.includes(data.output.as_str()) => Some(data),
            _ => None,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
