// In crates/engine/src/task.rs

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Spawns a periodic refresh loop.
///
/// The first tick fires immediately. A tick that comes due while the
/// previous refresh is still running is delayed, never stacked, so a loop
/// has at most one refresh in flight. Cancelling `token` stops the loop
/// between ticks and also abandons a refresh that is still awaiting its
/// responses.
pub fn spawn_poll_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    mut refresh: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        tracing::debug!(task = name, ?period, "Poll loop started.");
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = refresh() => {}
            }
        }

        tracing::debug!(task = name, "Poll loop stopped.");
    })
}
