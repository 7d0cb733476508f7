// ============================================================================
// spark-collection - Pending Set
// Which (item, output) pairs have not produced a value since activation
// ============================================================================
//
// Two indices, one per direction. Every mutation updates both, and an empty
// inner set is always removed, so "nothing pending" is a constant-time check
// on either index.
// ============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::types::{ItemKey, OutputName};

/// Outstanding (item, output) pairs, indexed both ways.
///
/// # Example
///
/// ```
/// use spark_collection::{OutputName, PendingSet};
///
/// let mut pending = PendingSet::new();
/// pending.mark("a", OutputName::from("foo"));
/// pending.mark("b", OutputName::from("foo"));
///
/// assert!(pending.resolve(&"a", "foo"));
/// assert!(!pending.is_empty());
/// assert_eq!(pending.remove_item(&"b"), 1);
/// assert!(pending.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct PendingSet<K> {
    by_item: HashMap<K, BTreeSet<OutputName>>,
    by_output: BTreeMap<OutputName, HashSet<K>>,
}

impl<K> Default for PendingSet<K> {
    fn default() -> Self {
        Self {
            by_item: HashMap::new(),
            by_output: BTreeMap::new(),
        }
    }
}

impl<K: ItemKey> PendingSet<K> {
    /// Nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `output` of `key`.
    pub fn mark(&mut self, key: K, output: OutputName) {
        self.by_output
            .entry(output.clone())
            .or_default()
            .insert(key.clone());
        self.by_item.entry(key).or_default().insert(output);
    }

    /// Stop waiting for `output` of `key`. Returns whether it was pending.
    pub fn resolve(&mut self, key: &K, output: &str) -> bool {
        let Some(outputs) = self.by_item.get_mut(key) else {
            return false;
        };
        if !outputs.remove(output) {
            return false;
        }
        if outputs.is_empty() {
            self.by_item.remove(key);
        }
        if let Some(keys) = self.by_output.get_mut(output) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_output.remove(output);
            }
        }
        true
    }

    /// Stop waiting for anything of `key`. Returns how many pairs cleared.
    pub fn remove_item(&mut self, key: &K) -> usize {
        let Some(outputs) = self.by_item.remove(key) else {
            return 0;
        };
        for output in &outputs {
            if let Some(keys) = self.by_output.get_mut(output) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_output.remove(output);
                }
            }
        }
        outputs.len()
    }

    /// Whether `output` of `key` is outstanding.
    pub fn is_pending(&self, key: &K, output: &str) -> bool {
        self.by_item
            .get(key)
            .is_some_and(|outputs| outputs.contains(output))
    }

    /// Whether nothing at all is outstanding.
    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }

    /// Whether no item is outstanding on `output`.
    pub fn is_output_clear(&self, output: &str) -> bool {
        !self.by_output.contains_key(output)
    }

    /// Number of outstanding pairs.
    pub fn len(&self) -> usize {
        self.by_item.values().map(BTreeSet::len).sum()
    }

    /// Outstanding outputs of `key`, in name order.
    pub fn outputs_of(&self, key: &K) -> impl Iterator<Item = &OutputName> + '_ {
        self.by_item.get(key).into_iter().flatten()
    }

    /// Whether both indices describe the same pairs.
    pub fn is_consistent(&self) -> bool {
        let forward: usize = self.by_output.values().map(HashSet::len).sum();
        forward == self.len()
            && self.by_item.iter().all(|(key, outputs)| {
                !outputs.is_empty()
                    && outputs.iter().all(|output| {
                        self.by_output
                            .get(output)
                            .is_some_and(|keys| keys.contains(key))
                    })
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> OutputName {
        OutputName::from(s)
    }

    #[test]
    fn mark_is_idempotent() {
        let mut pending = PendingSet::new();
        pending.mark(1, name("foo"));
        pending.mark(1, name("foo"));
        assert_eq!(pending.len(), 1);
        assert!(pending.is_consistent());
    }

    #[test]
    fn resolve_clears_both_indices() {
        let mut pending = PendingSet::new();
        pending.mark(1, name("foo"));
        pending.mark(1, name("bar"));
        pending.mark(2, name("foo"));

        assert!(pending.resolve(&1, "foo"));
        assert!(!pending.resolve(&1, "foo"));
        assert!(!pending.is_output_clear("foo"));
        assert!(pending.resolve(&2, "foo"));
        assert!(pending.is_output_clear("foo"));
        assert!(pending.is_pending(&1, "bar"));
        assert!(pending.is_consistent());
    }

    #[test]
    fn remove_item_scrubs_everything() {
        let mut pending = PendingSet::new();
        pending.mark("a", name("x"));
        pending.mark("a", name("y"));
        pending.mark("b", name("y"));
        assert_eq!(pending.remove_item(&"a"), 2);
        assert_eq!(pending.remove_item(&"a"), 0);
        assert!(pending.is_output_clear("x"));
        assert_eq!(pending.outputs_of(&"b").map(OutputName::as_str).collect::<Vec<_>>(), ["y"]);
        assert!(pending.is_consistent());
    }

    #[test]
    fn unknown_pairs_resolve_to_false() {
        let mut pending = PendingSet::<u8>::new();
        assert!(!pending.resolve(&9, "nothing"));
        assert!(pending.is_empty());
    }
}
