// ============================================================================
// spark-collection - Internal Macros
// Logging shims that compile away when the `tracing` feature is disabled
// ============================================================================

/// Structural events: reconciliation summaries, termination, disposal.
macro_rules! log_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-subscription and per-emission detail.
macro_rules! log_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::trace!($($arg)*);
        }
    };
}

pub(crate) use log_debug;
pub(crate) use log_trace;
