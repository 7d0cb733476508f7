// ============================================================================
// spark-collection - Core Module
// Fundamental types and errors shared by every engine
// ============================================================================

pub mod error;
pub mod types;

// Re-export commonly used items
pub use error::{ConfigError, StreamError};
pub use types::{Emitted, ItemKey, OutputName, OutputSelection, OutputValue};
