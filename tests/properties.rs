//! Property-based tests for the diff engine and the switch engine.
//!
//! Collections are generated from random key sequences whose outputs point
//! into a small shared pool of streams, so that versions overlap in keys and
//! in stream handles the way real successive versions do.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use proptest::prelude::*;
use spark_collection::{
    diff, switch_collection, Collection, Diff, EventStream, FnObserver, OutputSelection,
    OutputValue, Outputs, SnapshotAccumulator, Subject, SwitchEvent,
};

const NAMES: [&str; 3] = ["x", "y", "z"];
const POOL: usize = 4;

/// Items as (key, [(name index, pool index)]).
type Layout = Vec<(u8, Vec<(usize, usize)>)>;

/// Per key: position and output name -> stream id.
type Shape = HashMap<u8, (usize, BTreeMap<String, usize>)>;

fn layout() -> impl Strategy<Value = Layout> {
    prop::collection::vec(
        (
            0u8..12,
            prop::collection::vec((0usize..NAMES.len(), 0usize..POOL), 0..3),
        ),
        0..10,
    )
}

fn selection() -> impl Strategy<Value = Option<BTreeSet<usize>>> {
    prop::option::of(prop::collection::btree_set(0usize..NAMES.len(), 1..3))
}

fn to_selection(names: &Option<BTreeSet<usize>>) -> OutputSelection {
    match names {
        Some(names) => OutputSelection::named(names.iter().map(|&n| NAMES[n])).unwrap(),
        None => OutputSelection::AllOutputs,
    }
}

fn build(layout: &Layout, pool: &[EventStream<i32>]) -> Collection<u8, i32> {
    layout
        .iter()
        .map(|(key, outputs)| {
            let outputs: Outputs<i32> = outputs
                .iter()
                .map(|&(name, stream)| (NAMES[name], pool[stream].clone()))
                .collect();
            (*key, outputs)
        })
        .collect()
}

fn shape(collection: &Collection<u8, i32>, selection: &OutputSelection) -> Shape {
    collection
        .iter()
        .enumerate()
        .map(|(position, (key, outputs))| {
            let outputs = outputs
                .iter()
                .filter(|(name, _)| selection.includes(name.as_str()))
                .map(|(name, stream)| (name.to_string(), stream.id()))
                .collect();
            (*key, (position, outputs))
        })
        .collect()
}

fn replay(mut state: Shape, d: &Diff<u8, i32>) -> Shape {
    for key in d.removed.keys() {
        state.remove(key);
    }
    for (key, entry) in d.added.iter() {
        let outputs = entry
            .outputs
            .iter()
            .map(|(name, stream)| (name.to_string(), stream.id()))
            .collect();
        state.insert(*key, (entry.index, outputs));
    }
    for (key, delta) in d.changed.iter() {
        let (position, outputs) = state.get_mut(key).expect("changed key exists in previous");
        if let Some(index) = delta.index {
            *position = index;
        }
        for (name, stream) in &delta.outputs {
            match stream {
                Some(stream) => outputs.insert(name.to_string(), stream.id()),
                None => outputs.remove(name.as_str()),
            };
        }
    }
    state
}

fn stream_pool() -> Vec<EventStream<i32>> {
    (0..POOL).map(|_| Subject::new().stream()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Rebuilding the same layout into a fresh allocation never yields a diff.
    #[test]
    fn equal_versions_have_no_diff(items in layout(), names in selection()) {
        let pool = stream_pool();
        let selection = to_selection(&names);
        let a = build(&items, &pool);
        let b = build(&items, &pool);

        prop_assert!(diff(&selection, &a, &b).is_none());
        prop_assert!(diff(&selection, &a, &a).is_none());
    }

    /// Applying diff(A, B) to A reconstructs the keys, positions and selected
    /// stream handles of B.
    #[test]
    fn diff_replays_into_next_version(
        before in layout(),
        after in layout(),
        names in selection(),
    ) {
        let pool = stream_pool();
        let selection = to_selection(&names);
        let a = build(&before, &pool);
        let b = build(&after, &pool);

        let replayed = match diff(&selection, &a, &b) {
            Some(d) => replay(shape(&a, &selection), &d),
            None => shape(&a, &selection),
        };
        prop_assert_eq!(replayed, shape(&b, &selection));
    }

    /// Added, removed and changed are disjoint and agree with membership.
    #[test]
    fn diff_classifies_every_key_once(before in layout(), after in layout()) {
        let pool = stream_pool();
        let a = build(&before, &pool);
        let b = build(&after, &pool);

        if let Some(d) = diff(&OutputSelection::AllOutputs, &a, &b) {
            for key in d.added.keys() {
                prop_assert!(!a.contains_key(key) && b.contains_key(key));
            }
            for key in d.removed.keys() {
                prop_assert!(a.contains_key(key) && !b.contains_key(key));
            }
            for key in d.changed.keys() {
                prop_assert!(a.contains_key(key) && b.contains_key(key));
                prop_assert!(!d.added.contains_key(key) && !d.removed.contains_key(key));
            }
        }
    }

    /// After any run of versions, every pool stream has exactly as many live
    /// subscriptions as tracked (output, item) pairs reference it, and once
    /// every stream has emitted the accumulated table mirrors the last
    /// version.
    #[test]
    fn engine_tracks_the_last_version(
        versions in prop::collection::vec(layout(), 1..5),
        names in selection(),
    ) {
        let subjects: Vec<Subject<i32>> = (0..POOL).map(|_| Subject::new()).collect();
        let pool: Vec<_> = subjects.iter().map(Subject::stream).collect();
        let selection = to_selection(&names);

        let upstream = Subject::new();
        let accumulator = Rc::new(RefCell::new(SnapshotAccumulator::new(selection.clone())));
        let sink = accumulator.clone();
        let _sub = switch_collection(selection.clone(), upstream.stream()).subscribe(Rc::new(
            FnObserver::new(move |event: SwitchEvent<u8, i32>| {
                sink.borrow_mut().apply(event);
            }),
        ));

        let mut last = Collection::new();
        for items in &versions {
            last = build(items, &pool);
            upstream.emit(last.clone());
        }

        let mut expected = vec![0usize; POOL];
        for (_, outputs) in last.iter() {
            for (name, stream) in outputs.iter() {
                if selection.includes(name.as_str()) {
                    let slot = pool.iter().position(|p| p.ptr_eq(stream)).unwrap();
                    expected[slot] += 1;
                }
            }
        }
        for (slot, subject) in subjects.iter().enumerate() {
            prop_assert_eq!(subject.observer_count(), expected[slot]);
        }

        for (slot, subject) in subjects.iter().enumerate() {
            subject.emit(slot as i32);
        }

        let accumulator = accumulator.borrow();
        prop_assert!(accumulator.pending().is_empty());
        let table = accumulator.values();
        prop_assert_eq!(table.len(), last.len());
        for (position, (row, (key, outputs))) in table.iter().zip(last.iter()).enumerate() {
            prop_assert_eq!(row.key, *key);
            prop_assert_eq!(row.index, position);
            let mut cells = BTreeMap::new();
            for (name, stream) in outputs.iter() {
                if selection.includes(name.as_str()) {
                    let slot = pool.iter().position(|p| p.ptr_eq(stream)).unwrap();
                    cells.insert(name.clone(), OutputValue::Value(slot as i32));
                }
            }
            if let Some(selected) = selection.names() {
                for name in selected {
                    cells.entry(name.clone()).or_insert(OutputValue::Absent);
                }
            }
            prop_assert_eq!(&row.outputs, &cells);
        }
    }
}
