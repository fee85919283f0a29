//! Deferred execution for retried viewport requests.

use std::cell::{Cell, RefCell};
use std::time::Duration;

/// A task run once after a delay.
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks later on the same thread.
///
/// Tasks must re-check their preconditions when they run: the state that
/// scheduled them may have changed or been dropped in the meantime.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler driven explicitly by the caller.
///
/// Time only moves when [`ManualScheduler::advance`] is called, which makes
/// retry behavior deterministic in tests and headless runs.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_seq: Cell<u64>,
    queue: RefCell<Vec<Pending>>,
}

struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move time forward by `by`, running every task that falls due, in due
    /// order. Tasks scheduled while advancing run too if they fall due
    /// within the window. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let deadline = self.now.get() + by;
        let mut ran = 0;
        while let Some(pending) = self.pop_due(deadline) {
            self.now.set(pending.due.max(self.now.get()));
            (pending.task)();
            ran += 1;
        }
        self.now.set(deadline);
        ran
    }

    /// Run tasks until the queue is empty or `limit` tasks have run,
    /// advancing time as needed. Returns the number of tasks run.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit {
            let Some(pending) = self.pop_due(Duration::MAX) else {
                break;
            };
            self.now.set(pending.due.max(self.now.get()));
            (pending.task)();
            ran += 1;
        }
        ran
    }

    fn pop_due(&self, deadline: Duration) -> Option<Pending> {
        let mut queue = self.queue.borrow_mut();
        let index = queue
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= deadline)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(queue.swap_remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push(Pending {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }
}

/// Scheduler backed by tokio timers.
///
/// Tasks are spawned with `tokio::task::spawn_local`, so scheduling must
/// happen inside a `tokio::task::LocalSet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
