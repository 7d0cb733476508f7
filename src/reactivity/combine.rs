// ============================================================================
// spark-collection - Combinators
// Merge and combine-latest over the outputs of a dynamic collection
// ============================================================================

use std::collections::BTreeMap;

use crate::collections::collection::Collection;
use crate::core::error::ConfigError;
use crate::core::types::{ItemKey, OutputName, OutputSelection, OutputValue};
use crate::primitives::stream::EventStream;
use crate::reactivity::snapshot::Snapshot;
use crate::reactivity::switch::switch_collection;

/// Rows of a keyed combine: item key and its output cells, in item order.
pub type KeyedValues<K, V> = Vec<(K, BTreeMap<OutputName, OutputValue<V>>)>;

/// Every value emitted by output `name` of any current item.
///
/// Items lacking the output contribute nothing.
///
/// # Example
///
/// ```
/// use spark_collection::testing::Recorder;
/// use spark_collection::{merge, Collection, EventStream, Outputs, Subject};
///
/// let versions = Subject::new();
/// let recorder = Recorder::new();
/// let _subscription = merge("n", versions.stream()).unwrap().subscribe(recorder.observer());
///
/// versions.emit(
///     Collection::new()
///         .with_item(1, Outputs::new().with("n", EventStream::just(10)))
///         .with_item(2, Outputs::new()),
/// );
/// assert_eq!(recorder.values(), vec![10]);
/// ```
pub fn merge<K: ItemKey, V: Clone + 'static>(
    name: impl Into<OutputName>,
    versions: EventStream<Collection<K, V>>,
) -> Result<EventStream<V>, ConfigError> {
    let selection = OutputSelection::single(name)?;
    Ok(switch_collection(selection.clone(), versions)
        .events(&selection)
        .filter_map(|event| event.value.into_value()))
}

/// One merged stream per name.
pub fn merge_grouped<K, V, I, N>(
    names: I,
    versions: EventStream<Collection<K, V>>,
) -> Result<BTreeMap<OutputName, EventStream<V>>, ConfigError>
where
    K: ItemKey,
    V: Clone + 'static,
    I: IntoIterator<Item = N>,
    N: Into<OutputName>,
{
    let selection = OutputSelection::named(names)?;
    selection
        .names()
        .into_iter()
        .flatten()
        .map(|name| Ok((name.clone(), merge(name, versions.clone())?)))
        .collect()
}

/// Latest value of output `name` of every item, in item order.
pub fn combine_array<K: ItemKey, V: Clone + PartialEq + 'static>(
    name: impl Into<OutputName>,
    versions: EventStream<Collection<K, V>>,
) -> Result<EventStream<Vec<OutputValue<V>>>, ConfigError> {
    let name = name.into();
    let selection = OutputSelection::single(name.clone())?;
    Ok(switch_collection(selection, versions)
        .snapshot()
        .map(move |snapshot| column(&snapshot, &name)))
}

/// One independent [`combine_array`] per name.
///
/// Each name waits only on its own outputs.
pub fn combine_grouped<K, V, I, N>(
    names: I,
    versions: EventStream<Collection<K, V>>,
) -> Result<BTreeMap<OutputName, EventStream<Vec<OutputValue<V>>>>, ConfigError>
where
    K: ItemKey,
    V: Clone + PartialEq + 'static,
    I: IntoIterator<Item = N>,
    N: Into<OutputName>,
{
    let selection = OutputSelection::named(names)?;
    selection
        .names()
        .into_iter()
        .flatten()
        .map(|name| Ok((name.clone(), combine_array(name, versions.clone())?)))
        .collect()
}

/// Latest cells of every selected output of every item, keyed by item.
///
/// # Example
///
/// ```
/// use spark_collection::testing::Recorder;
/// use spark_collection::{
///     combine_keyed, Collection, EventStream, OutputSelection, OutputValue, Outputs, Subject,
/// };
///
/// let versions = Subject::new();
/// let recorder = Recorder::new();
/// let selection = OutputSelection::named(["x", "y"]).unwrap();
/// let _subscription = combine_keyed(selection, versions.stream()).subscribe(recorder.observer());
///
/// versions.emit(Collection::new().with_item("a", Outputs::new().with("x", EventStream::just(1))));
///
/// let rows = recorder.values().pop().unwrap();
/// assert_eq!(rows[0].0, "a");
/// assert_eq!(rows[0].1["x"], OutputValue::Value(1));
/// assert_eq!(rows[0].1["y"], OutputValue::Absent);
/// ```
pub fn combine_keyed<K: ItemKey, V: Clone + PartialEq + 'static>(
    selection: OutputSelection,
    versions: EventStream<Collection<K, V>>,
) -> EventStream<KeyedValues<K, V>> {
    switch_collection(selection, versions)
        .snapshot()
        .map(|snapshot| {
            snapshot
                .iter()
                .map(|row| (row.key.clone(), row.outputs.clone()))
                .collect()
        })
}

fn column<K, V: Clone>(snapshot: &Snapshot<K, V>, name: &OutputName) -> Vec<OutputValue<V>> {
    snapshot
        .iter()
        .map(|row| row.outputs.get(name).cloned().unwrap_or(OutputValue::Unknown))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::collection::Outputs;
    use crate::testing::Recorder;
    use crate::primitives::subject::Subject;

    #[test]
    fn merge_follows_membership() {
        let versions = Subject::new();
        let (a, b) = (Subject::new(), Subject::new());
        let recorder = Recorder::new();
        let _sub = merge("n", versions.stream())
            .unwrap()
            .subscribe(recorder.observer());

        let v1 = Collection::new().with_item("a", Outputs::new().with("n", a.stream()));
        versions.emit(v1.clone());
        a.emit(1);
        versions.emit(v1.with_item("b", Outputs::new().with("n", b.stream())));
        b.emit(2);
        a.emit(3);
        versions.emit(Collection::new().with_item("b", Outputs::new().with("n", b.stream())));
        a.emit(4);
        b.emit(5);

        assert_eq!(recorder.values(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn merge_rejects_blank_name() {
        let versions = Subject::<Collection<u8, i32>>::new();
        assert!(matches!(
            merge("  ", versions.stream()),
            Err(ConfigError::BlankOutputName(_))
        ));
    }

    #[test]
    fn combine_array_reports_columns_in_item_order() {
        let versions = Subject::new();
        let (a, b) = (Subject::new(), Subject::new());
        let recorder = Recorder::new();
        let _sub = combine_array("n", versions.stream())
            .unwrap()
            .subscribe(recorder.observer());

        versions.emit(
            Collection::new()
                .with_item("b", Outputs::new().with("n", b.stream()))
                .with_item("a", Outputs::new().with("n", a.stream())),
        );
        a.emit(1);
        b.emit(2);

        assert_eq!(
            recorder.values(),
            vec![vec![OutputValue::Value(2), OutputValue::Value(1)]]
        );
    }

    #[test]
    fn grouped_names_block_independently() {
        let versions = Subject::new();
        let (x, y) = (Subject::new(), Subject::new());
        let groups = combine_grouped(["x", "y"], versions.stream()).unwrap();
        let xs = Recorder::new();
        let ys = Recorder::new();
        let _x = groups["x"].subscribe(xs.observer());
        let _y = groups["y"].subscribe(ys.observer());

        versions.emit(Collection::new().with_item(
            "a",
            Outputs::new().with("x", x.stream()).with("y", y.stream()),
        ));
        x.emit(1);

        assert_eq!(xs.values(), vec![vec![OutputValue::Value(1)]]);
        assert!(ys.is_empty());
        y.emit(2);
        assert_eq!(ys.values(), vec![vec![OutputValue::Value(2)]]);
    }

    #[test]
    fn merge_grouped_splits_by_name() {
        let versions = Subject::new();
        let streams = merge_grouped(["x", "y"], versions.stream()).unwrap();
        let ys = Recorder::new();
        let _y = streams["y"].subscribe(ys.observer());
        versions.emit(Collection::new().with_item(
            0u8,
            Outputs::new()
                .with("x", EventStream::just(1))
                .with("y", EventStream::just(2)),
        ));
        assert_eq!(ys.values(), vec![2]);
    }
}
