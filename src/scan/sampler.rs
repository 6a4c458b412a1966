//! Cancellable periodic sampling task
//!
//! The browser-style "host timer + captured closures" pattern is replaced by
//! an explicit handle: the tick body is an async closure that is awaited to
//! completion before the next tick is considered, and cancelling the handle
//! guarantees that no further tick body executes after `cancel()` returns.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Result of one tick body, deciding whether the sampler keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep sampling on the next cadence boundary
    Continue,
    /// Stop the sampler; no further ticks fire
    Stop,
}

/// Handle to a running sampler task
pub struct SamplerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Cancel the sampler and wait for it to wind down.
    ///
    /// An in-flight tick body is allowed to finish, but once this returns no
    /// tick body will run again.
    pub async fn cancel(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    /// True once the sampler task has exited (stopped itself or was cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a sampler invoking `tick` every `cadence`.
///
/// Ticks never overlap: the returned future of one invocation is awaited
/// before the interval is polled again, and a cadence boundary that passes
/// while a tick is still in flight is skipped rather than queued. Ticks
/// therefore also run in strict chronological order.
pub fn spawn_sampler<F, Fut>(cadence: Duration, mut tick: F) -> SamplerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send,
{
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // tokio intervals fire immediately; consume the zeroth tick so the
        // first sample lands one full cadence after start, like a plain
        // repeating timer.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stopped.changed() => break,
                _ = interval.tick() => {
                    if tick().await == TickOutcome::Stop {
                        break;
                    }
                }
            }
        }
    });

    SamplerHandle { stop, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_fire_on_cadence() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let handle = spawn_sampler(Duration::from_millis(300), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Continue
            }
        });

        time::sleep(Duration::from_millis(950)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_after_cancel_returns() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let handle = spawn_sampler(Duration::from_millis(300), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Continue
            }
        });

        time::sleep(Duration::from_millis(350)).await;
        handle.cancel().await;
        let at_cancel = count.load(Ordering::SeqCst);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_outcome_ends_the_sampler() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let handle = spawn_sampler(Duration::from_millis(300), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Stop
            }
        });

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());

        handle.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_are_skipped_not_queued() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        // Each tick takes 2.5 cadences; skipped boundaries must not pile up.
        let handle = spawn_sampler(Duration::from_millis(300), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_millis(750)).await;
                TickOutcome::Continue
            }
        });

        time::sleep(Duration::from_millis(2000)).await;
        // Ticks start at 300, then every ~900ms (750ms busy + next boundary).
        let fired = count.load(Ordering::SeqCst);
        assert!(fired <= 3, "expected skipped ticks, got {fired}");

        handle.cancel().await;
    }
}
