// ============================================================================
// spark-collection - Async Bridge
// Exposes a push stream as a `futures::Stream` for async consumers
// ============================================================================
//
// Engines deliver synchronously, inside the producer's call. An async
// consumer instead polls, so values are buffered in an unbounded channel
// until the consumer gets to them. The subscription is held by the async
// stream and released when it is dropped.
// ============================================================================

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};

use crate::core::error::StreamError;
use crate::primitives::stream::{EventStream, Observer};
use crate::primitives::subscription::Subscription;

struct ChannelObserver<T> {
    sender: UnboundedSender<Result<T, StreamError>>,
}

impl<T> Observer<T> for ChannelObserver<T> {
    fn next(&self, value: T) {
        // Fails only once the receiver is gone, and then the subscription is
        // already being released.
        let _ = self.sender.unbounded_send(Ok(value));
    }

    fn complete(&self) {
        self.sender.close_channel();
    }

    fn error(&self, error: StreamError) {
        let _ = self.sender.unbounded_send(Err(error));
        self.sender.close_channel();
    }
}

/// A push stream buffered for polling.
///
/// Yields `Ok` for every value and a final `Err` if the stream failed, then
/// ends. Dropping it releases the underlying subscription.
pub struct AsyncEvents<T> {
    receiver: UnboundedReceiver<Result<T, StreamError>>,
    subscription: Subscription,
}

impl<T> AsyncEvents<T> {
    /// Stop the underlying stream; buffered values can still be polled.
    pub fn release(&mut self) {
        std::mem::take(&mut self.subscription).dispose();
    }
}

impl<T> Stream for AsyncEvents<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl<T: 'static> EventStream<T> {
    /// Subscribe now and hand the values to an async consumer.
    ///
    /// # Example
    ///
    /// ```
    /// use futures::executor::block_on;
    /// use futures::StreamExt;
    /// use spark_collection::{EventStream, StreamError};
    ///
    /// let values: Vec<Result<i32, StreamError>> =
    ///     block_on(EventStream::from_iter([1, 2]).to_async().collect());
    /// assert_eq!(values, vec![Ok(1), Ok(2)]);
    /// ```
    pub fn to_async(&self) -> AsyncEvents<T> {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(std::rc::Rc::new(ChannelObserver { sender }));
        AsyncEvents {
            receiver,
            subscription,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
