//! Periodic reset-delay refresh.
//!
//! An amplifier whose reset timer runs out drops remote control and returns to
//! local operation. The keep-alive task rewrites the delay on a fixed interval
//! through the normal command path, so it queues behind foreground commands
//! instead of racing them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, warn};

use hegel_core::types::Minutes;

use crate::commands;
use crate::executor::Executor;

/// Reset delay written at connect and on every tick.
pub const DEFAULT_RESET_DELAY: Minutes = 3;

/// Interval between refreshes. Shorter than the delay so it never lapses.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Spawn the keep-alive task. The first tick fires one `interval` from now;
/// the connect-time refresh is issued by the caller.
pub(crate) fn spawn_keep_alive(
    executor: Arc<Executor>,
    delay: Minutes,
    interval: Duration,
    cancel: CancellationToken,
    span: Span,
) -> JoinHandle<()> {
    let task = async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let request = commands::cmd_set_reset_delay(delay);
            // Cancellation during the exchange abandons it cleanly.
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = executor.request_reset(&request) => result,
            };

            match result {
                Ok(current) => debug!(delay = %current, "reset delay refreshed"),
                Err(e) => {
                    warn!(error = %e, "keep-alive failed, retrying next tick");
                    executor.handler().on_error(&e);
                }
            }
        }

        debug!("keep-alive stopped");
    };
    tokio::spawn(task.instrument(span))
}
