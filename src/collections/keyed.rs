// ============================================================================
// spark-collection - ChangeMap
// Insertion-ordered keyed map with constant-time removal
// ============================================================================
//
// Diff results are replayed in the order entries were recorded, and the diff
// engine both inserts and plucks entries while scanning. Removal leaves a
// tombstone in the slot vector; `compact` squeezes them out once the map is
// final.
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Keyed map that iterates in insertion order.
///
/// Re-inserting an existing key replaces its value and keeps its position.
#[derive(Clone)]
pub struct ChangeMap<K, T> {
    slots: Vec<Option<(K, T)>>,
    index: HashMap<K, usize>,
}

impl<K, T> Default for ChangeMap<K, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, T> ChangeMap<K, T> {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: K, value: T) {
        match self.index.get(&key) {
            Some(&slot) => self.slots[slot] = Some((key, value)),
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Some((key, value)));
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<T> {
        let slot = self.index.remove(key)?;
        self.slots[slot].take().map(|(_, value)| value)
    }

    /// Drop tombstones left by `remove`.
    pub(crate) fn compact(&mut self) {
        if self.slots.len() == self.index.len() {
            return;
        }
        self.slots.retain(Option::is_some);
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some((key, _)) = slot {
                self.index.insert(key.clone(), i);
            }
        }
    }

    /// Value recorded for `key`.
    pub fn get(&self, key: &K) -> Option<&T> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|(_, value)| value)
    }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(k, v)| (k, v)))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: PartialEq, T: PartialEq> PartialEq for ChangeMap<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.slots
            .iter()
            .flatten()
            .eq(other.slots.iter().flatten())
    }
}

impl<K: fmt::Debug, T: fmt::Debug> fmt::Debug for ChangeMap<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().flatten().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Eq + Hash + Clone, T> FromIterator<(K, T)> for ChangeMap<K, T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_across_replace() {
        let mut map = ChangeMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        map.insert("b", 3);
        assert_eq!(map.iter().collect::<Vec<_>>(), [(&"b", &3), (&"a", &2)]);
    }

    #[test]
    fn remove_then_compact() {
        let mut map: ChangeMap<_, _> = [(1, 'a'), (2, 'b'), (3, 'c')].into_iter().collect();
        assert_eq!(map.remove(&2), Some('b'));
        assert_eq!(map.remove(&2), None);
        assert_eq!(map.len(), 2);
        map.compact();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), [1, 3]);
        assert_eq!(map.get(&3), Some(&'c'));
        map.insert(2, 'z');
        assert_eq!(map.values().copied().collect::<Vec<_>>(), ['a', 'c', 'z']);
    }

    #[test]
    fn equality_ignores_tombstones() {
        let mut left: ChangeMap<_, _> = [(1, 1), (2, 2)].into_iter().collect();
        left.remove(&1);
        let right: ChangeMap<_, _> = [(2, 2)].into_iter().collect();
        assert_eq!(left, right);
    }
}
