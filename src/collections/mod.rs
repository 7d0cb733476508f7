// ============================================================================
// spark-collection - Collections
// Immutable keyed collection versions and the diff between two of them
// ============================================================================

pub mod collection;
pub mod diff;
pub mod keyed;

pub use collection::{Collection, Outputs};
pub use diff::{compare_items, compare_outputs, diff, Diff, ItemDelta, ItemEntry};
pub use keyed::ChangeMap;
