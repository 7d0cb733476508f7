// ============================================================================
// spark-collection - Core Types
// Output names, output selection, and the value cells shared by every engine
// ============================================================================

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::core::error::ConfigError;

// =============================================================================
// ITEM KEY
// =============================================================================

/// Bound satisfied by every type usable as a collection item key.
///
/// Keys must be cheap to clone; they are copied into diffs, subscription
/// tables and snapshots.
pub trait ItemKey: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T> ItemKey for T where T: Clone + Eq + Hash + fmt::Debug + 'static {}

// =============================================================================
// OUTPUT NAME
// =============================================================================

/// Name of one output of an item. Clones share the same allocation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputName(Rc<str>);

impl OutputName {
    /// Create a name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OutputName {
    fn from(name: &str) -> Self {
        Self(Rc::from(name))
    }
}

impl From<String> for OutputName {
    fn from(name: String) -> Self {
        Self(Rc::from(name))
    }
}

impl From<&OutputName> for OutputName {
    fn from(name: &OutputName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for OutputName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OutputName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for OutputName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for OutputName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

// =============================================================================
// OUTPUT SELECTION
// =============================================================================

/// Which outputs of each item an engine tracks.
///
/// `NamedOutputs` also restricts diff comparison and reporting to those
/// names, and makes the engine track a placeholder for any named output an
/// item lacks.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum OutputSelection {
    /// Track every output name that appears on any item.
    #[default]
    AllOutputs,
    /// Track only these names. Never empty.
    NamedOutputs(BTreeSet<OutputName>),
}

impl OutputSelection {
    /// Select a fixed, non-empty set of names.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_collection::{ConfigError, OutputSelection};
    ///
    /// let selection = OutputSelection::named(["value", "label"]).unwrap();
    /// assert!(selection.includes("value"));
    /// assert!(!selection.includes("other"));
    ///
    /// let empty: [&str; 0] = [];
    /// assert_eq!(OutputSelection::named(empty), Err(ConfigError::EmptySelection));
    /// ```
    pub fn named<I, N>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = N>,
        N: Into<OutputName>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            let name = name.into();
            if name.as_str().trim().is_empty() {
                return Err(ConfigError::BlankOutputName(name.as_str().to_owned()));
            }
            set.insert(name);
        }
        if set.is_empty() {
            return Err(ConfigError::EmptySelection);
        }
        Ok(Self::NamedOutputs(set))
    }

    /// Select a single name.
    pub fn single(name: impl Into<OutputName>) -> Result<Self, ConfigError> {
        Self::named([name.into()])
    }

    /// Whether `name` passes this selection.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::AllOutputs => true,
            Self::NamedOutputs(names) => names.contains(name),
        }
    }

    /// The explicit names, if any.
    pub fn names(&self) -> Option<&BTreeSet<OutputName>> {
        match self {
            Self::AllOutputs => None,
            Self::NamedOutputs(names) => Some(names),
        }
    }
}

// =============================================================================
// VALUE CELLS
// =============================================================================

/// A value forwarded by the switch engine for one (item, output) pair.
///
/// `Absent` is produced when a selected output does not exist on an item, so
/// that a downstream combine is never blocked by it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Emitted<V> {
    /// A value emitted by the item's output.
    Value(V),
    /// The item has no such output.
    Absent,
}

impl<V> Emitted<V> {
    /// The carried value, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Consume into the carried value, if any.
    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent => None,
        }
    }
}

/// The latest known state of one output inside a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputValue<V> {
    /// Selected but nothing observed yet.
    Unknown,
    /// The item has no such output.
    Absent,
    /// Latest value emitted.
    Value(V),
}

impl<V> OutputValue<V> {
    /// The latest value, if one has been observed.
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Whether anything (a value or an absence) has been observed.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl<V> Default for OutputValue<V> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<V> From<Emitted<V>> for OutputValue<V> {
    fn from(emitted: Emitted<V>) -> Self {
        match emitted {
            Emitted::Value(value) => Self::Value(value),
            Emitted::Absent => Self::Absent,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
