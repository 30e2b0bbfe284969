//! Update source: long-poll the transport and hand out each event once.
//!
//! The cursor is the smallest `update_id` not yet handed off. It only moves
//! forward, and it moves before the event is yielded, so an event is never
//! delivered twice even across restarts that restore the cursor.
//!
//! Poll failures are retried with exponential backoff and up to 10 % jitter.
//! Cancellation is checked before every poll, every backoff sleep, and every
//! hand-off.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::config::LoopConfig;
use relay_core::Event;

use crate::transport::MessagingTransport;

/// Jitter fraction applied to each delay.
const JITTER_FRACTION: f64 = 0.10;

/// Shared view of the polling cursor.
///
/// The host keeps a clone so it can persist the position on shutdown.
#[derive(Debug, Clone, Default)]
pub struct CursorHandle(Arc<AtomicI64>);

impl CursorHandle {
    pub fn new(offset: i64) -> Self {
        Self(Arc::new(AtomicI64::new(offset)))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    fn advance_past(&self, update_id: i64) {
        self.0.fetch_max(update_id.saturating_add(1), Ordering::SeqCst);
    }
}

/// Exponential backoff between `base` and `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Delay before the next retry. Doubles per call, never exceeds `max`.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(16);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        (delay + jitter(delay)).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// A jitter offset in `0..JITTER_FRACTION * base`.
///
/// Uses the sub-second nanos of the system clock, which is plenty to keep
/// restarted processes from polling in lockstep.
fn jitter(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = (base.as_millis() as f64 * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(nanos as u64 % max_jitter)
}

/// Long-polls a [`MessagingTransport`] and yields new events in order.
pub struct UpdateSource {
    transport: Arc<dyn MessagingTransport>,
    cursor: CursorHandle,
    wait: Duration,
    backoff: Backoff,
}

impl UpdateSource {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        cursor: CursorHandle,
        config: &LoopConfig,
    ) -> Self {
        Self {
            transport,
            cursor,
            wait: Duration::from_secs(config.poll_timeout_secs),
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
        }
    }

    /// Turn the source into a stream that ends once `cancel` fires.
    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Event> + Send {
        let UpdateSource {
            transport,
            cursor,
            wait,
            mut backoff,
        } = self;

        stream! {
            'poll: loop {
                let polled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'poll,
                    polled = transport.poll(cursor.get(), wait) => polled,
                };

                let events = match polled {
                    Ok(events) => {
                        backoff.reset();
                        events
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(
                            error = %e,
                            offset = cursor.get(),
                            delay_ms = delay.as_millis() as u64,
                            "failed to get updates, retrying"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break 'poll,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue 'poll;
                    }
                };

                for event in events {
                    if event.update_id < cursor.get() {
                        debug!(update_id = event.update_id, offset = cursor.get(), "skipping stale update");
                        continue;
                    }
                    if cancel.is_cancelled() {
                        break 'poll;
                    }
                    cursor.advance_past(event.update_id);
                    yield event;
                }
            }
            info!(offset = cursor.get(), "update source stopped");
        }
    }
}
