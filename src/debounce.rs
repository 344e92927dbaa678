//! Debounced task scheduling for typing-triggered scans
//!
//! Each `Debouncer` owns exactly one pending invocation: scheduling again
//! before the delay elapses cancels the pending one. A task that has
//! already fired is never interrupted — an in-flight classification call
//! runs to completion and its result is discarded downstream via
//! generation stamps, not preempted here. Independent debouncers never
//! cancel each other: the fast pattern timer and the slow entity timer
//! restart independently.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Single-slot debounced scheduler
pub struct Debouncer {
    delay: Duration,

    /// Cancellation flag of the most recently scheduled invocation;
    /// checked once, after the delay elapses and before the task fires
    pending: Mutex<Option<Arc<AtomicBool>>>,
}

impl Debouncer {
    /// Create a debouncer with a fixed delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// The configured delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task` to run after the delay
    ///
    /// Cancels this debouncer's pending (not yet fired) invocation, if
    /// any. Once a task has fired it runs to completion.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            task.await;
        });

        let mut pending = self.pending.lock().expect("pending lock poisoned");
        if let Some(old) = pending.replace(cancelled) {
            old.store(true, Ordering::SeqCst);
        }
    }

    /// Cancel the pending invocation, if it has not fired yet
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        if let Some(flag) = pending.take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_task_runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_cancels_pending() {
        let debouncer = Debouncer::new(Duration::from_millis(30));
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&count);
            debouncer.schedule(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fired_task_runs_to_completion() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        debouncer.schedule(async move {
            // Already past the delay when the restart below happens
            tokio::time::sleep(Duration::from_millis(40)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Wait until the first task has fired, then restart
        tokio::time::sleep(Duration::from_millis(25)).await;
        let counter = Arc::clone(&count);
        debouncer.schedule(async move {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Both ran: the in-flight one was not interrupted
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_independent_debouncers_do_not_cancel_each_other() {
        let fast = Debouncer::new(Duration::from_millis(10));
        let slow = Debouncer::new(Duration::from_millis(40));
        let fast_count = Arc::new(AtomicUsize::new(0));
        let slow_count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&slow_count);
        slow.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Restarting the fast timer repeatedly must not disturb the slow one
        for _ in 0..3 {
            let counter = Arc::clone(&fast_count);
            fast.schedule(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fast_count.load(Ordering::SeqCst), 1);
        assert_eq!(slow_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
