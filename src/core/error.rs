// ============================================================================
// spark-collection - Errors
// Setup-time configuration errors and the terminal error carried by streams
// ============================================================================

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

/// Errors raised synchronously while configuring an engine, before any
/// subscription is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A named output selection was requested with no names in it.
    #[error("an output selection must name at least one output")]
    EmptySelection,

    /// One of the requested output names was empty or whitespace.
    #[error("output names must not be blank (got {0:?})")]
    BlankOutputName(String),
}

// =============================================================================
// STREAM ERRORS
// =============================================================================

/// Terminal error delivered through [`Observer::error`](crate::Observer::error).
///
/// Cheap to clone so that one failure can be fanned out to every observer of
/// a multicast source. Equality compares the message only.
#[derive(Clone, Error)]
#[error("{message}")]
pub struct StreamError {
    message: Rc<str>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StreamError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Rc::from(message.into()),
            source: None,
        }
    }

    /// Wrap an arbitrary error, keeping it reachable through `source()`.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: Rc::from(error.to_string()),
            source: Some(Arc::new(error)),
        }
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamError")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for StreamError {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::EmptySelection.to_string(),
            "an output selection must name at least one output"
        );
        assert!(ConfigError::BlankOutputName("  ".into())
            .to_string()
            .contains("\"  \""));
    }

    #[test]
    fn stream_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StreamError::from_error(io);
        assert_eq!(err.message(), "disk gone");
        assert!(err.source().is_some());

        let plain = StreamError::new("boom");
        assert!(plain.source().is_none());
        assert_eq!(plain, StreamError::new("boom"));
        assert_eq!(plain.to_string(), "boom");
    }
}
