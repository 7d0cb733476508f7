// ============================================================================
// spark-collection - Snapshot Accumulator
// Latest value of every tracked (item, output) pair, combine-latest style
// ============================================================================
//
// Folds a switch engine's events into an ordered table of latest values.
// Nothing is emitted while any tracked pair has yet to report since it was
// (re)activated. Removing the last pair still outstanding unblocks emission
// immediately.
//
// Emitted snapshots are shared, immutable copies: the table is mutated
// through `Rc::make_mut`, so a snapshot handed downstream never changes.
// ============================================================================

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::collections::diff::Diff;
use crate::core::error::StreamError;
use crate::core::types::{ItemKey, OutputName, OutputSelection, OutputValue};
use crate::macros::log_trace;
use crate::primitives::stream::{EventStream, Observer, Producer};
use crate::primitives::subscription::Subscription;
use crate::reactivity::pending::PendingSet;
use crate::reactivity::switch::{ChangeSet, CollectionStream, DataEvent, SwitchEvent};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// One item's row in a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEntry<K, V> {
    pub key: K,
    pub index: usize,
    pub outputs: BTreeMap<OutputName, OutputValue<V>>,
}

impl<K, V> SnapshotEntry<K, V> {
    /// The cell for `output`.
    pub fn get(&self, output: &str) -> Option<&OutputValue<V>> {
        self.outputs.get(output)
    }

    /// The latest value of `output`, if one was observed.
    pub fn value(&self, output: &str) -> Option<&V> {
        self.get(output).and_then(OutputValue::value)
    }
}

/// Rows ordered by item index.
pub type Snapshot<K, V> = Rc<Vec<SnapshotEntry<K, V>>>;

// =============================================================================
// ACCUMULATOR
// =============================================================================

/// The fold behind [`snapshot`], usable on its own.
///
/// In `NamedOutputs` mode every selected name of every item is pending until
/// the engine reports it (missing outputs report `Absent` straight away). In
/// `AllOutputs` mode only outputs the item actually has are pending, and an
/// output dropped from an item is dropped from its row.
pub struct SnapshotAccumulator<K, V> {
    selection: OutputSelection,
    pending: PendingSet<K>,
    values: Snapshot<K, V>,
    positions: HashMap<K, usize>,
    last_emitted: Option<Snapshot<K, V>>,
    initial: bool,
}

impl<K: ItemKey, V: Clone + PartialEq> SnapshotAccumulator<K, V> {
    /// Empty accumulator seeding rows for `selection`.
    pub fn new(selection: OutputSelection) -> Self {
        Self {
            selection,
            pending: PendingSet::new(),
            values: Rc::new(Vec::new()),
            positions: HashMap::new(),
            last_emitted: None,
            initial: true,
        }
    }

    /// Pairs still outstanding.
    pub fn pending(&self) -> &PendingSet<K> {
        &self.pending
    }

    /// The current table, emitted or not.
    pub fn values(&self) -> &Snapshot<K, V> {
        &self.values
    }

    /// Fold one event. Returns the snapshot to emit, if any.
    pub fn apply(&mut self, event: SwitchEvent<K, V>) -> Option<Snapshot<K, V>> {
        let first = std::mem::replace(&mut self.initial, false);
        match event {
            SwitchEvent::Changes(changes) => self.on_changes(changes, first),
            SwitchEvent::Data(data) => self.on_data(data),
        }
    }

    fn on_changes(&mut self, changes: ChangeSet<K, V>, first: bool) -> Option<Snapshot<K, V>> {
        if let Some(diff) = &changes.diff {
            self.apply_diff(diff);
        }
        if !self.pending.is_empty() {
            log_trace!(pending = self.pending.len(), "snapshot waiting on outputs");
            return None;
        }
        let differs = self
            .last_emitted
            .as_ref()
            .is_none_or(|last| **last != *self.values);
        if first || differs {
            Some(self.emit())
        } else {
            None
        }
    }

    fn on_data(&mut self, data: DataEvent<K, V>) -> Option<Snapshot<K, V>> {
        let DataEvent { key, output, value } = data;
        let position = *self.positions.get(&key)?;
        self.pending.resolve(&key, output.as_str());
        let entries = Rc::make_mut(&mut self.values);
        entries[position].outputs.insert(output, value.into());
        if self.pending.is_empty() {
            Some(self.emit())
        } else {
            None
        }
    }

    fn apply_diff(&mut self, diff: &Diff<K, V>) {
        let entries = Rc::make_mut(&mut self.values);

        for (key, entry) in diff.added.iter() {
            let mut outputs = BTreeMap::new();
            match &self.selection {
                OutputSelection::NamedOutputs(names) => {
                    for name in names {
                        outputs.insert(name.clone(), OutputValue::Unknown);
                        self.pending.mark(key.clone(), name.clone());
                    }
                }
                OutputSelection::AllOutputs => {
                    for name in entry.outputs.names() {
                        self.pending.mark(key.clone(), name.clone());
                    }
                }
            }
            entries.push(SnapshotEntry {
                key: key.clone(),
                index: entry.index,
                outputs,
            });
        }

        for (key, delta) in diff.changed.iter() {
            let Some(&position) = self.positions.get(key) else {
                continue;
            };
            let row = &mut entries[position];
            if let Some(index) = delta.index {
                row.index = index;
            }
            for (name, stream) in &delta.outputs {
                match (stream, &self.selection) {
                    (Some(_), _) | (None, OutputSelection::NamedOutputs(_)) => {
                        self.pending.mark(key.clone(), name.clone());
                    }
                    (None, OutputSelection::AllOutputs) => {
                        self.pending.resolve(key, name.as_str());
                        row.outputs.remove(name.as_str());
                    }
                }
            }
        }

        if !diff.removed.is_empty() {
            for key in diff.removed.keys() {
                self.pending.remove_item(key);
            }
            entries.retain(|row| !diff.removed.contains_key(&row.key));
        }

        entries.sort_by_key(|row| row.index);
        self.positions = entries
            .iter()
            .enumerate()
            .map(|(position, row)| (row.key.clone(), position))
            .collect();
    }

    fn emit(&mut self) -> Snapshot<K, V> {
        log_trace!(items = self.values.len(), "emitting snapshot");
        self.last_emitted = Some(self.values.clone());
        self.values.clone()
    }
}

// =============================================================================
// STREAM
// =============================================================================

struct SnapshotSource<K, V> {
    selection: OutputSelection,
    events: EventStream<SwitchEvent<K, V>>,
}

struct SnapshotObserver<K, V> {
    accumulator: RefCell<SnapshotAccumulator<K, V>>,
    downstream: Rc<dyn Observer<Snapshot<K, V>>>,
}

impl<K: ItemKey, V: Clone + PartialEq + 'static> Producer<Snapshot<K, V>> for SnapshotSource<K, V> {
    fn run(&self, observer: Rc<dyn Observer<Snapshot<K, V>>>) -> Subscription {
        self.events.subscribe(Rc::new(SnapshotObserver {
            accumulator: RefCell::new(SnapshotAccumulator::new(self.selection.clone())),
            downstream: observer,
        }))
    }
}

impl<K: ItemKey, V: Clone + PartialEq> Observer<SwitchEvent<K, V>> for SnapshotObserver<K, V> {
    fn next(&self, event: SwitchEvent<K, V>) {
        let emitted = self.accumulator.borrow_mut().apply(event);
        if let Some(snapshot) = emitted {
            self.downstream.next(snapshot);
        }
    }

    fn complete(&self) {
        self.downstream.complete();
    }

    fn error(&self, error: StreamError) {
        self.downstream.error(error);
    }
}

/// Fold switch events into snapshots.
///
/// `selection` must be the one the events were produced with.
pub fn snapshot<K: ItemKey, V: Clone + PartialEq + 'static>(
    selection: OutputSelection,
    events: EventStream<SwitchEvent<K, V>>,
) -> EventStream<Snapshot<K, V>> {
    EventStream::new(SnapshotSource { selection, events })
}

impl<K: ItemKey, V: Clone + PartialEq + 'static> CollectionStream<K, V> {
    /// Latest values of every tracked output, emitted whenever none is
    /// outstanding.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_collection::testing::Recorder;
    /// use spark_collection::{switch_collection, Collection, OutputSelection, Outputs, Subject};
    ///
    /// let versions = Subject::new();
    /// let (s1, s2) = (Subject::new(), Subject::new());
    /// let recorder = Recorder::new();
    /// let _subscription = switch_collection(OutputSelection::single("foo").unwrap(), versions.stream())
    ///     .snapshot()
    ///     .subscribe(recorder.observer());
    ///
    /// versions.emit(
    ///     Collection::new()
    ///         .with_item("a", Outputs::new().with("foo", s1.stream()))
    ///         .with_item("b", Outputs::new().with("foo", s2.stream())),
    /// );
    /// s1.emit(1);
    /// assert!(recorder.is_empty());
    ///
    /// s2.emit(2);
    /// let snapshot = recorder.values().pop().unwrap();
    /// assert_eq!(snapshot[0].value("foo"), Some(&1));
    /// assert_eq!(snapshot[1].value("foo"), Some(&2));
    /// ```
    pub fn snapshot(&self) -> EventStream<Snapshot<K, V>> {
        snapshot(self.selection().clone(), self.stream().clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
