//! Session-scoped scheduling: the periodic refresh task and the
//! latest-query-wins gate for suggestion lookups.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default cadence for a live weather view.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// tokio's interval timer panics on a zero period; treat zero as a
/// request for the default cadence.
fn effective_interval(requested: Duration) -> Duration {
    if requested.is_zero() {
        DEFAULT_REFRESH_INTERVAL
    } else {
        requested
    }
}

/// An owned periodic task. `tick` runs once per interval until the task
/// is cancelled; dropping the handle cancels it too, so tearing down a
/// view cannot leak the timer.
#[derive(Debug)]
pub struct RefreshTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Start the worker. A zero `interval` falls back to
    /// [`DEFAULT_REFRESH_INTERVAL`].
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let interval = effective_interval(interval);
        let token = CancellationToken::new();
        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // A tokio interval fires immediately; consume that tick so the
            // first refresh lands one full interval from now.
            timer.tick().await;
            loop {
                tokio::select! {
                    _ = run_token.cancelled() => break,
                    _ = timer.tick() => tick().await,
                }
            }
        });

        Self { token, handle }
    }

    /// Stop the periodic task. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Orders suggestion queries so a stale response can never replace a
/// newer one: take a ticket when issuing the query, and apply the result
/// only while that ticket is still the newest.
#[derive(Debug, Default)]
pub struct SuggestionGate {
    latest: AtomicU64,
}

impl SuggestionGate {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
        }
    }

    /// Register a newly issued query and return its ticket.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a response holding `ticket` may still be applied.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}
