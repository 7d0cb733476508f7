// ============================================================================
// spark-collection - Subscription
// Move-only disposal token for one running stream
// ============================================================================
//
// A Subscription owns at most one teardown closure. Disposing consumes the
// token, and dropping an undisposed token disposes it, so a teardown can run
// at most once no matter how the owner lets go of it.
// ============================================================================

use std::fmt;

/// Teardown closure run when a subscription is released.
pub type TeardownFn = Box<dyn FnOnce()>;

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle to a running stream. Releasing it stops delivery.
///
/// # Example
///
/// ```
/// use spark_collection::Subscription;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runs = Rc::new(Cell::new(0));
/// let runs_clone = runs.clone();
/// let subscription = Subscription::new(move || runs_clone.set(runs_clone.get() + 1));
///
/// subscription.dispose();
/// assert_eq!(runs.get(), 1);
/// ```
#[must_use = "dropping a Subscription immediately stops the stream"]
pub struct Subscription {
    teardown: Option<TeardownFn>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when released.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Release the stream.
    pub fn dispose(mut self) {
        self.release();
    }

    /// Whether releasing this token would still run a teardown.
    pub fn is_live(&self) -> bool {
        self.teardown.is_some()
    }

    /// Give up the token without stopping the stream.
    ///
    /// Delivery continues until the stream terminates on its own; nothing can
    /// stop it early afterwards. Only meaningful for producers that keep
    /// their observer alive, such as [`Subject`](crate::Subject) and shared
    /// streams.
    pub fn detach(mut self) {
        self.teardown = None;
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.is_live())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
