// ============================================================================
// spark-collection - Primitives Module
// The push-based sequence abstraction: streams, subjects, subscriptions
// ============================================================================

pub mod bridge;
pub mod operators;
pub mod share;
pub mod stream;
pub mod subject;
pub mod subscription;

// Re-export for convenience
pub use bridge::AsyncEvents;
pub use stream::{EventStream, FnObserver, Observer, Producer};
pub use subject::Subject;
pub use subscription::{Subscription, TeardownFn};
