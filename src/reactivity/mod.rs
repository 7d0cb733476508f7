// ============================================================================
// spark-collection - Reactivity Module
// Stateful engines: subscription switching, pending tracking, snapshots
// ============================================================================

pub mod combine;
pub mod delivery;
pub mod pending;
pub mod snapshot;
pub mod switch;

pub use combine::{
    combine_array, combine_grouped, combine_keyed, merge, merge_grouped, KeyedValues,
};
pub use delivery::DeliveryQueue;
pub use pending::PendingSet;
pub use snapshot::{snapshot, Snapshot, SnapshotAccumulator, SnapshotEntry};
pub use switch::{
    switch_collection, ChangeSet, CollectionStream, DataEvent, ItemChange, SwitchEvent,
};
