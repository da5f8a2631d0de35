//! Log tailing behind the event stream abstraction

use std::time::Duration;

use tether_common::resilience::Backoff;
use tether_domain::config::StreamingConfig;
use tether_domain::LogEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::event_stream::{EventSender, EventStream};
use super::ports::LogSource;

/// Pacing of a tailing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Wait after a read that returned nothing new.
    pub idle_interval: Duration,
    /// Cap for the escalating wait after transient read failures.
    pub max_backoff: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

impl From<&StreamingConfig> for StreamOptions {
    fn from(config: &StreamingConfig) -> Self {
        Self { idle_interval: config.idle_interval(), max_backoff: config.max_backoff() }
    }
}

/// Tail `source` until cancelled or a non-retryable error occurs.
///
/// Lines are delivered in read order. Transient read errors are reported as
/// [`LogEvent::Interrupted`] and tailing continues after an escalating
/// wait; any other error ends the stream with [`LogEvent::Failed`]. A read
/// already in flight when the stream is cancelled runs to completion and its
/// lines are discarded.
pub fn stream_logs<S>(source: S, options: StreamOptions, cancel: CancellationToken) -> EventStream<LogEvent>
where
    S: LogSource + 'static,
{
    EventStream::spawn(cancel, move |tx| tail(source, options, tx))
}

async fn tail<S: LogSource>(mut source: S, options: StreamOptions, tx: EventSender<LogEvent>) {
    let mut backoff = Backoff::new(options.idle_interval, options.max_backoff);

    loop {
        if tx.is_cancelled() {
            debug!("log stream cancelled");
            return;
        }

        let delay = match source.read().await {
            Ok(lines) if lines.is_empty() => backoff.on_success(),
            Ok(lines) => {
                backoff.on_success();
                for line in lines {
                    if !tx.emit(LogEvent::Line(line)).await {
                        return;
                    }
                }
                Duration::ZERO
            }
            Err(error) if error.is_retryable() => {
                let delay = backoff.on_failure();
                warn!(error = %error, retry_in_ms = delay.as_millis() as u64, "log read interrupted");
                if !tx.emit(LogEvent::Interrupted(error)).await {
                    return;
                }
                delay
            }
            Err(error) => {
                warn!(error = %error, "log stream failed");
                tx.finish(LogEvent::Failed(error)).await;
                return;
            }
        };

        if !delay.is_zero() {
            tokio::select! {
                biased;
                () = tx.cancellation().cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
