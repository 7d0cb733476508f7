// ============================================================================
// spark-collection - Incremental Reconciliation over Dynamic Collections
// ============================================================================
//
// Tracks an ordered, keyed collection of items whose named outputs are push
// streams. Successive collection versions are diffed in linear time, the
// switch engine keeps exactly one subscription per (output, item) alive
// across versions, and the snapshot accumulator folds the resulting events
// into combine-latest tables.
//
// Everything is single-threaded: handles are `Rc` and delivery is
// synchronous.
// ============================================================================

mod macros;

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

#[doc(hidden)]
pub mod testing;

// Re-export core items at crate root for ergonomic access
pub use crate::core::error::{ConfigError, StreamError};
pub use crate::core::types::{Emitted, ItemKey, OutputName, OutputSelection, OutputValue};

// Re-export the stream abstraction
pub use crate::primitives::bridge::AsyncEvents;
pub use crate::primitives::stream::{EventStream, FnObserver, Observer, Producer};
pub use crate::primitives::subject::Subject;
pub use crate::primitives::subscription::{Subscription, TeardownFn};

// Re-export collections and the diff engine
pub use crate::collections::collection::{Collection, Outputs};
pub use crate::collections::diff::{compare_items, compare_outputs, diff, Diff, ItemDelta, ItemEntry};
pub use crate::collections::keyed::ChangeMap;

// Re-export engines
pub use crate::reactivity::combine::{
    combine_array, combine_grouped, combine_keyed, merge, merge_grouped, KeyedValues,
};
pub use crate::reactivity::delivery::DeliveryQueue;
pub use crate::reactivity::pending::PendingSet;
pub use crate::reactivity::snapshot::{snapshot, Snapshot, SnapshotAccumulator, SnapshotEntry};
pub use crate::reactivity::switch::{
    switch_collection, ChangeSet, CollectionStream, DataEvent, ItemChange, SwitchEvent,
};

// =============================================================================
// TESTS
// =============================================================================
