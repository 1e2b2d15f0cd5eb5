//! Minimal periodic task runner.
//!
//! Each scheduled task runs on its own loop, so a task never overlaps with
//! itself; a run that overshoots its interval skips the missed ticks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::DaemonError;

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    /// Interval between runs, read once when the schedule starts.
    fn schedule(&self) -> Duration;

    async fn on_schedule_started(&self) {}

    async fn run(&self) -> Result<(), DaemonError>;
}

/// Run `task` every [`Task::schedule`] until `shutdown` fires. The first
/// run happens one interval after start. A failed run is logged and the
/// schedule continues.
pub async fn run_scheduled(task: Arc<dyn Task>, mut shutdown: broadcast::Receiver<()>) {
    let period = task.schedule();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;
    task.on_schedule_started().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {
                if let Err(err) = task.run().await {
                    tracing::error!(task = task.name(), error = %err, "scheduled task failed");
                }
            }
        }
    }
    tracing::debug!(task = task.name(), "schedule stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    struct Counting {
        runs: AtomicUsize,
        started: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Task for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn schedule(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn on_schedule_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        async fn run(&self) -> Result<(), DaemonError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DaemonError::Protocol("boom".to_string()));
            }
            Ok(())
        }
    }

    fn counting(fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            runs: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn runs_once_per_interval_after_the_first() {
        let task = counting(false);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_scheduled(task.clone(), rx));

        tokio::task::yield_now().await;
        assert_eq!(task.started.load(Ordering::SeqCst), 1);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0, "no run at start");

        advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failures_do_not_stop_the_schedule() {
        let task = counting(true);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_scheduled(task.clone(), rx));
        tokio::task::yield_now().await;

        for _ in 0..3 {
            advance(Duration::from_secs(60)).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
