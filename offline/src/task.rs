//! Best-effort background tasks.
//!
//! Cache write-backs run detached from the request that produced them. A
//! failure is logged at debug level and otherwise ignored; it never reaches
//! the caller.

use std::fmt::Display;
use std::future::Future;

use tokio_util::task::TaskTracker;

/// Tracker for detached best-effort work.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn `work` and detach it. Errors are swallowed.
    pub fn spawn_best_effort<F, E>(&self, label: impl Into<String>, work: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let label = label.into();
        self.tracker.spawn(async move {
            if let Err(e) = work.await {
                log::debug!("[SW Router] best-effort {} dropped: {}", label, e);
            }
        });
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every task spawned so far to finish.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn settle_waits_for_spawned_work() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = done.clone();
            tasks.spawn_best_effort("count", async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn errors_are_swallowed() {
        let tasks = BackgroundTasks::new();
        tasks.spawn_best_effort("fail", async { Err::<(), _>("disk on fire") });
        tasks.settle().await;

        // Tracker is usable again after settling.
        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();
        tasks.spawn_best_effort("again", async move {
            flag.store(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
