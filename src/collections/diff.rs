// ============================================================================
// spark-collection - Diff Engine
// Linear structural comparison of two collection versions
// ============================================================================
//
// Both versions are walked in lock-step. An entry seen on one side is held
// provisionally (as removed or added) until the same key turns up on the
// other side, at which point the pair is reconciled into a `changed` entry
// or dropped if nothing differs. Every key is touched a constant number of
// times, so the whole comparison is O(n) without sorting.
// ============================================================================

use std::fmt;

use crate::collections::collection::{Collection, Outputs};
use crate::collections::keyed::ChangeMap;
use crate::core::types::{ItemKey, OutputName, OutputSelection};
use crate::primitives::stream::EventStream;

// =============================================================================
// TYPES
// =============================================================================

/// An item that appeared or disappeared.
pub struct ItemEntry<V> {
    /// Position in the version the item belongs to.
    pub index: usize,
    /// Its outputs. Added entries are restricted to the selection.
    pub outputs: Outputs<V>,
}

/// What changed about an item present in both versions.
pub struct ItemDelta<V> {
    /// New position, if it moved.
    pub index: Option<usize>,
    /// One entry per output whose stream was replaced (`Some`) or dropped
    /// (`None`). Empty when only the index moved.
    pub outputs: Vec<(OutputName, Option<EventStream<V>>)>,
}

/// Classification of two versions into added, removed and changed items.
///
/// Each map iterates in the order the diff engine recorded its entries.
pub struct Diff<K, V> {
    pub added: ChangeMap<K, ItemEntry<V>>,
    pub removed: ChangeMap<K, ItemEntry<V>>,
    pub changed: ChangeMap<K, ItemDelta<V>>,
}

impl<V> Clone for ItemEntry<V> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            outputs: self.outputs.clone(),
        }
    }
}

impl<V> PartialEq for ItemEntry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.outputs == other.outputs
    }
}

impl<V> fmt::Debug for ItemEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemEntry")
            .field("index", &self.index)
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl<V> Clone for ItemDelta<V> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            outputs: self.outputs.clone(),
        }
    }
}

impl<V> PartialEq for ItemDelta<V> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.outputs == other.outputs
    }
}

impl<V> fmt::Debug for ItemDelta<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemDelta")
            .field("index", &self.index)
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl<K: Clone, V> Clone for Diff<K, V> {
    fn clone(&self) -> Self {
        Self {
            added: self.added.clone(),
            removed: self.removed.clone(),
            changed: self.changed.clone(),
        }
    }
}

impl<K: PartialEq, V> PartialEq for Diff<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.added == other.added && self.removed == other.removed && self.changed == other.changed
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Diff<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diff")
            .field("added", &self.added)
            .field("removed", &self.removed)
            .field("changed", &self.changed)
            .finish()
    }
}

impl<K: ItemKey, V> Default for Diff<K, V> {
    fn default() -> Self {
        Self {
            added: ChangeMap::new(),
            removed: ChangeMap::new(),
            changed: ChangeMap::new(),
        }
    }
}

impl<K: ItemKey, V> Diff<K, V> {
    /// Whether no item is added, removed or changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of classified items.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

// =============================================================================
// DIFF
// =============================================================================

/// Compare two versions.
///
/// Returns `None` when both hold the same keys at the same positions with the
/// same output streams (restricted to `selection`).
///
/// # Example
///
/// ```
/// use spark_collection::{diff, Collection, EventStream, OutputSelection, Outputs};
///
/// let foo = EventStream::just(1);
/// let prev = Collection::new()
///     .with_item("a", Outputs::new().with("foo", foo.clone()))
///     .with_item("b", Outputs::new());
/// let next = Collection::new()
///     .with_item("b", Outputs::new())
///     .with_item("a", Outputs::new().with("foo", foo));
///
/// let d = diff(&OutputSelection::AllOutputs, &prev, &next).unwrap();
/// assert!(d.added.is_empty() && d.removed.is_empty());
/// assert_eq!(d.changed.get(&"a").unwrap().index, Some(1));
/// assert_eq!(d.changed.get(&"b").unwrap().index, Some(0));
///
/// assert!(diff(&OutputSelection::AllOutputs, &next, &next.clone()).is_none());
/// ```
pub fn diff<K: ItemKey, V>(
    selection: &OutputSelection,
    prev: &Collection<K, V>,
    next: &Collection<K, V>,
) -> Option<Diff<K, V>> {
    let mut result = Diff::default();
    let mut last_iter = prev.iter();
    let mut next_iter = next.iter();
    let mut index = 0usize;

    loop {
        let last = last_iter.next();
        let current = next_iter.next();
        if last.is_none() && current.is_none() {
            break;
        }

        if let Some((key, outputs)) = last {
            let entry = ItemEntry {
                index,
                outputs: outputs.clone(),
            };
            match result.added.remove(key) {
                Some(provisional) => {
                    if let Some(delta) = compare_items(selection, &entry, &provisional) {
                        result.changed.insert(key.clone(), delta);
                    }
                }
                None => result.removed.insert(key.clone(), entry),
            }
        }

        if let Some((key, outputs)) = current {
            match result.removed.remove(key) {
                Some(previous) => {
                    let entry = ItemEntry {
                        index,
                        outputs: outputs.clone(),
                    };
                    if let Some(delta) = compare_items(selection, &previous, &entry) {
                        result.changed.insert(key.clone(), delta);
                    }
                }
                None => {
                    let outputs = match selection.names() {
                        Some(names) => outputs.pluck(names),
                        None => outputs.clone(),
                    };
                    result.added.insert(key.clone(), ItemEntry { index, outputs });
                }
            }
        }

        index += 1;
    }

    if result.is_empty() {
        return None;
    }
    result.added.compact();
    result.removed.compact();
    Some(result)
}

/// Compare one item across two versions.
///
/// `None` means neither its position nor any selected output changed.
pub fn compare_items<V>(
    selection: &OutputSelection,
    last: &ItemEntry<V>,
    next: &ItemEntry<V>,
) -> Option<ItemDelta<V>> {
    let outputs = compare_outputs(selection, &last.outputs, &next.outputs);
    let index = (last.index != next.index).then_some(next.index);
    if index.is_none() && outputs.is_empty() {
        return None;
    }
    Some(ItemDelta { index, outputs })
}

/// Outputs replaced, dropped or introduced between two output sets.
///
/// Old names come first (in name order), followed by newly present names.
pub fn compare_outputs<V>(
    selection: &OutputSelection,
    last: &Outputs<V>,
    next: &Outputs<V>,
) -> Vec<(OutputName, Option<EventStream<V>>)> {
    if last == next {
        return Vec::new();
    }
    let mut changed = Vec::new();
    for (name, stream) in last.iter() {
        if !selection.includes(name.as_str()) {
            continue;
        }
        match next.get(name.as_str()) {
            Some(replacement) if replacement.ptr_eq(stream) => {}
            Some(replacement) => changed.push((name.clone(), Some(replacement.clone()))),
            None => changed.push((name.clone(), None)),
        }
    }
    for (name, stream) in next.iter() {
        if selection.includes(name.as_str()) && !last.contains(name.as_str()) {
            changed.push((name.clone(), Some(stream.clone())));
        }
    }
    changed
}

// =============================================================================
// TESTS
// =============================================================================
