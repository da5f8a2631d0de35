//! Cancellable, lazily consumed event stream backed by a background producer

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tether_domain::{LogEvent, Outcome, ProgressEvent, TetherError, Warnings};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Events a stream can end on.
pub trait StreamEvent: Send + 'static {
    /// Whether this is the last event the producer will deliver.
    fn is_terminal(&self) -> bool;
}

impl<T: Send + 'static> StreamEvent for ProgressEvent<T> {
    fn is_terminal(&self) -> bool {
        ProgressEvent::is_terminal(self)
    }
}

impl StreamEvent for LogEvent {
    fn is_terminal(&self) -> bool {
        LogEvent::is_terminal(self)
    }
}

/// Producer side of an [`EventStream`].
///
/// The channel holds a single event: `emit` suspends until the consumer has
/// taken the previous one.
#[derive(Debug)]
pub struct EventSender<E> {
    tx: mpsc::Sender<E>,
    cancel: CancellationToken,
}

impl<E: StreamEvent> EventSender<E> {
    /// Deliver a non-terminal event.
    ///
    /// Returns `false` once the stream was cancelled or its consumer dropped;
    /// the producer must stop.
    pub async fn emit(&self, event: E) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Deliver the last event. Ignored if nobody is listening any more.
    pub async fn finish(&self, event: E) {
        if self.tx.send(event).await.is_err() {
            debug!("terminal event dropped, consumer gone");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Ordered sequence of events from one operation.
///
/// Not restartable. The stream ends after its terminal event or after
/// [`cancel`](Self::cancel); dropping it cancels the producer as well.
#[derive(Debug)]
pub struct EventStream<E> {
    rx: mpsc::Receiver<E>,
    cancel: CancellationToken,
    done: bool,
}

impl<E: StreamEvent> EventStream<E> {
    /// Spawn `producer` on the current tokio runtime.
    ///
    /// `cancel` is observed by the producer; cancelling it from outside ends
    /// the operation the same way as [`cancel`](Self::cancel) does. The
    /// stream only ever cancels a child of `cancel`, never the caller's token.
    pub fn spawn<F, Fut>(cancel: CancellationToken, producer: F) -> Self
    where
        F: FnOnce(EventSender<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(1);
        let sender = EventSender { tx, cancel: cancel.clone() };
        tokio::spawn(producer(sender));
        Self { rx, cancel, done: false }
    }

    /// Stop the producer and end the stream now. Idempotent.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        self.done = true;
    }

    /// Whether the terminal event was delivered or the stream was cancelled.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub async fn next_event(&mut self) -> Option<E> {
        self.next().await
    }
}

impl<E: StreamEvent> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.done = true;
                    this.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T: Send + 'static> EventStream<ProgressEvent<T>> {
    /// Drain the stream into its final result and every warning seen.
    ///
    /// A stream that ends without a terminal event (cancelled) yields
    /// `TetherError::Cancelled`.
    pub async fn outcome(mut self) -> Outcome<T> {
        let mut warnings = Warnings::new();
        while let Some(event) = self.next().await {
            match event {
                ProgressEvent::Status(_) => {}
                ProgressEvent::Warnings(batch) => warnings.merge(&batch),
                ProgressEvent::Succeeded(value) => return Outcome::success(value, warnings),
                ProgressEvent::Failed(error) => return Outcome::failure(error, warnings),
            }
        }
        Outcome::failure(TetherError::Cancelled, warnings)
    }
}
