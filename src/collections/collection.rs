// ============================================================================
// spark-collection - Collection
// Immutable, ordered, keyed versions of a dynamic set of items
// ============================================================================
//
// Every mutator returns a new version and leaves the receiver untouched.
// Versions share storage until one of them is changed (copy-on-write), and
// `same_version` detects when two handles are physically the same version so
// the switch engine can skip diffing altogether.
// ============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::core::types::{ItemKey, OutputName};
use crate::primitives::stream::EventStream;

// =============================================================================
// OUTPUTS
// =============================================================================

/// The named outputs of one item.
///
/// Equality compares names and stream identity.
///
/// # Example
///
/// ```
/// use spark_collection::{EventStream, Outputs};
///
/// let value = EventStream::just(1);
/// let outputs = Outputs::new().with("value", value.clone());
///
/// assert!(outputs.get("value").is_some_and(|s| s.ptr_eq(&value)));
/// assert_eq!(outputs, Outputs::new().with("value", value));
/// assert_ne!(outputs, Outputs::new().with("value", EventStream::just(1)));
/// ```
pub struct Outputs<V> {
    map: Rc<BTreeMap<OutputName, EventStream<V>>>,
}

impl<V> Clone for Outputs<V> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<V> Default for Outputs<V> {
    fn default() -> Self {
        Self {
            map: Rc::new(BTreeMap::new()),
        }
    }
}

impl<V> PartialEq for Outputs<V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.map, &other.map) || self.map == other.map
    }
}

impl<V> Eq for Outputs<V> {}

impl<V> fmt::Debug for Outputs<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

impl<V> Outputs<V> {
    /// No outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one output.
    pub fn with(mut self, name: impl Into<OutputName>, stream: EventStream<V>) -> Self {
        Rc::make_mut(&mut self.map).insert(name.into(), stream);
        self
    }

    /// Drop one output.
    pub fn without(mut self, name: &str) -> Self {
        if self.map.contains_key(name) {
            Rc::make_mut(&mut self.map).remove(name);
        }
        self
    }

    /// The stream for `name`.
    pub fn get(&self, name: &str) -> Option<&EventStream<V>> {
        self.map.get(name)
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Outputs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&OutputName, &EventStream<V>)> + '_ {
        self.map.iter()
    }

    /// Names in order.
    pub fn names(&self) -> impl Iterator<Item = &OutputName> + '_ {
        self.map.keys()
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether there are no outputs.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keep only the listed names.
    pub fn pluck(&self, names: &BTreeSet<OutputName>) -> Self {
        if self.map.keys().all(|name| names.contains(name)) {
            return self.clone();
        }
        let map = self
            .map
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, stream)| (name.clone(), stream.clone()))
            .collect();
        Self { map: Rc::new(map) }
    }
}

impl<V, N> FromIterator<(N, EventStream<V>)> for Outputs<V>
where
    N: Into<OutputName>,
{
    fn from_iter<I: IntoIterator<Item = (N, EventStream<V>)>>(iter: I) -> Self {
        Self {
            map: Rc::new(iter.into_iter().map(|(n, s)| (n.into(), s)).collect()),
        }
    }
}

// =============================================================================
// COLLECTION
// =============================================================================

/// An immutable, ordered sequence of keyed items.
///
/// # Example
///
/// ```
/// use spark_collection::{Collection, EventStream, Outputs};
///
/// let v1 = Collection::new()
///     .with_item("a", Outputs::new().with("n", EventStream::just(1)))
///     .with_item("b", Outputs::new());
/// let v2 = v1.moved_to(&"b", 0);
///
/// assert_eq!(v1.keys().collect::<Vec<_>>(), [&"a", &"b"]);
/// assert_eq!(v2.keys().collect::<Vec<_>>(), [&"b", &"a"]);
/// assert_eq!(v2.position(&"a"), Some(1));
/// ```
pub struct Collection<K, V> {
    entries: Rc<Vec<(K, Outputs<V>)>>,
    positions: Rc<HashMap<K, usize>>,
}

impl<K, V> Clone for Collection<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            positions: self.positions.clone(),
        }
    }
}

impl<K: ItemKey, V> Default for Collection<K, V> {
    fn default() -> Self {
        Self {
            entries: Rc::new(Vec::new()),
            positions: Rc::new(HashMap::new()),
        }
    }
}

impl<K: PartialEq, V> PartialEq for Collection<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries) || self.entries == other.entries
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Collection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, o)| (k, o)))
            .finish()
    }
}

impl<K: ItemKey, V> Collection<K, V> {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entries(entries: Vec<(K, Outputs<V>)>) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.clone(), i))
            .collect();
        Self {
            entries: Rc::new(entries),
            positions: Rc::new(positions),
        }
    }

    /// Items in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Outputs<V>)> + '_ {
        self.entries.iter().map(|(k, o)| (k, o))
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Outputs of `key`.
    pub fn get(&self, key: &K) -> Option<&Outputs<V>> {
        self.positions.get(key).map(|&i| &self.entries[i].1)
    }

    /// Item at `index`.
    pub fn get_at(&self, index: usize) -> Option<(&K, &Outputs<V>)> {
        self.entries.get(index).map(|(k, o)| (k, o))
    }

    /// Zero-based position of `key`.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether both handles are physically the same version.
    pub fn same_version(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    /// Replace the outputs of `key` in place, or append a new item.
    pub fn with_item(&self, key: K, outputs: Outputs<V>) -> Self {
        match self.positions.get(&key) {
            Some(&i) => {
                let mut entries = (*self.entries).clone();
                entries[i].1 = outputs;
                Self {
                    entries: Rc::new(entries),
                    positions: self.positions.clone(),
                }
            }
            None => {
                let mut entries = (*self.entries).clone();
                let mut positions = (*self.positions).clone();
                positions.insert(key.clone(), entries.len());
                entries.push((key, outputs));
                Self {
                    entries: Rc::new(entries),
                    positions: Rc::new(positions),
                }
            }
        }
    }

    /// Insert (or move and replace) `key` at `index`, clamped to the end.
    pub fn inserted_at(&self, index: usize, key: K, outputs: Outputs<V>) -> Self {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| *k != key)
            .cloned()
            .collect();
        let index = index.min(entries.len());
        entries.insert(index, (key, outputs));
        Self::from_entries(entries)
    }

    /// Drop `key`. Returns an unchanged handle if it is absent.
    pub fn without(&self, key: &K) -> Self {
        if !self.contains_key(key) {
            return self.clone();
        }
        Self::from_entries(
            self.entries
                .iter()
                .filter(|(k, _)| k != key)
                .cloned()
                .collect(),
        )
    }

    /// Move `key` to `index`, clamped to the end.
    pub fn moved_to(&self, key: &K, index: usize) -> Self {
        match self.get(key) {
            Some(outputs) => self.inserted_at(index, key.clone(), outputs.clone()),
            None => self.clone(),
        }
    }
}

impl<K: ItemKey, V> FromIterator<(K, Outputs<V>)> for Collection<K, V> {
    /// Later duplicates replace earlier ones in place.
    fn from_iter<I: IntoIterator<Item = (K, Outputs<V>)>>(iter: I) -> Self {
        let mut entries: Vec<(K, Outputs<V>)> = Vec::new();
        let mut positions: HashMap<K, usize> = HashMap::new();
        for (key, outputs) in iter {
            match positions.get(&key) {
                Some(&i) => entries[i].1 = outputs,
                None => {
                    positions.insert(key.clone(), entries.len());
                    entries.push((key, outputs));
                }
            }
        }
        Self {
            entries: Rc::new(entries),
            positions: Rc::new(positions),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
