//! One-shot delayed callbacks on the tokio runtime.
//!
//! Each scheduled callback gets its own task that sleeps until the deadline
//! and then runs once. Errors returned by a callback, and panics raised
//! inside one, are handed to the scheduler's fault handler instead of
//! disappearing with the task.

use std::fmt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::error;

/// Log target for callback failures.
pub const FAULT_TARGET: &str = "waffle::fault";

/// A callback that returned an error or panicked.
#[derive(Debug)]
pub struct TaskFault {
    pub task_id: u64,
    pub error: anyhow::Error,
}

pub type FaultHandler = Arc<dyn Fn(TaskFault) + Send + Sync>;

fn log_fault(fault: TaskFault) {
    error!(
        target: FAULT_TARGET,
        task_id = fault.task_id,
        error = ?fault.error,
        "scheduled callback failed"
    );
}

#[derive(Clone)]
pub struct DelayScheduler {
    next_id: Arc<AtomicU64>,
    on_fault: FaultHandler,
}

impl fmt::Debug for DelayScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayScheduler")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for DelayScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayScheduler {
    pub fn new() -> Self {
        Self::with_fault_handler(log_fault)
    }

    pub fn with_fault_handler(handler: impl Fn(TaskFault) + Send + Sync + 'static) -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            on_fault: Arc::new(handler),
        }
    }

    /// Run `callback` once at `at`. A time in the past fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, at: DateTime<Utc>, callback: F) -> ScheduledTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.schedule_after(delay, callback)
    }

    pub fn schedule_after<F, Fut>(&self, delay: Duration, callback: F) -> ScheduledTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;
        let on_fault = Arc::clone(&self.on_fault);

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let outcome = AssertUnwindSafe(async move { callback().await })
                .catch_unwind()
                .await;
            let error = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(error)) => error,
                Err(panic) => {
                    anyhow::anyhow!("scheduled callback panicked: {}", panic_message(&*panic))
                }
            };
            on_fault(TaskFault { task_id: id, error });
        });

        ScheduledTask {
            id,
            deadline,
            handle: handle.abort_handle(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string payload"
    }
}

/// Handle to an armed callback. Dropping it leaves the callback armed.
#[derive(Debug)]
pub struct ScheduledTask {
    id: u64,
    deadline: Instant,
    handle: AbortHandle,
}

impl ScheduledTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Disarm the callback. Has no effect once it has started running.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&hits);
        (hits, move || Arc::clone(&shared))
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_the_deadline() {
        let scheduler = DelayScheduler::new();
        let (hits, handle) = counter();
        let hit = handle();

        let task = scheduler.schedule_after(Duration::from_secs(5), move || async move {
            hit.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!task.is_finished());

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn past_times_fire_immediately() {
        let scheduler = DelayScheduler::new();
        let (hits, handle) = counter();
        let hit = handle();

        let task = scheduler.schedule(Utc::now() - chrono::Duration::minutes(5), move || async move {
            hit.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(task.deadline() <= Instant::now());

        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tasks_never_fire() {
        let scheduler = DelayScheduler::new();
        let (hits, handle) = counter();
        let hit = handle();

        let task = scheduler.schedule_after(Duration::from_secs(1), move || async move {
            hit.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        task.cancel();

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_keeps_the_task_armed() {
        let scheduler = DelayScheduler::new();
        let (hits, handle) = counter();
        let hit = handle();

        drop(scheduler.schedule_after(Duration::from_secs(1), move || async move {
            hit.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_errors_reach_the_fault_handler() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let scheduler = DelayScheduler::with_fault_handler(move |fault| {
            sink.lock().unwrap().push((fault.task_id, fault.error.to_string()));
        });

        let task = scheduler.schedule_after(Duration::from_secs(1), || async {
            Err(anyhow::anyhow!("unban failed"))
        });

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;

        let faults = faults.lock().unwrap();
        assert_eq!(faults.as_slice(), &[(task.id(), "unban failed".to_owned())]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callbacks_reach_the_fault_handler() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let scheduler = DelayScheduler::with_fault_handler(move |fault| {
            sink.lock().unwrap().push((fault.task_id, fault.error.to_string()));
        });

        let task = scheduler.schedule_after(Duration::from_secs(1), || async {
            let pending: Vec<u64> = Vec::new();
            let _ = pending[0];
            Ok(())
        });

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;

        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].0, task.id());
        assert!(faults[0].1.contains("panicked"), "{}", faults[0].1);
        assert!(faults[0].1.contains("index out of bounds"), "{}", faults[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_are_independent() {
        let scheduler = DelayScheduler::new();
        let (hits, handle) = counter();

        for seconds in [3_u64, 1, 2] {
            let hit = handle();
            scheduler.schedule_after(Duration::from_secs(seconds), move || async move {
                hit.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        tokio::time::advance(Duration::from_millis(1_500)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
