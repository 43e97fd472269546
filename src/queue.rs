//! Ready queues: one FIFO of runnable tasks per executor, each guarded by
//! its own mutex and condition variable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::task::Task;

/// How long a blocked `pop_head_blocking`/`wait_for_signal` call waits
/// between rechecking the shutdown flag. Rust has no safe equivalent of
/// cancelling a blocked thread outright, so cancellation here is cooperative
/// polling instead of an async signal; see `Board::kill`. Also the interval
/// at which the primary executor's retry loop re-attempts a steal while its
/// own queue is empty (see `Executor::next_task`).
pub(crate) const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Default)]
pub(crate) struct ReadyQueue {
    inner: Mutex<VecDeque<Box<Task>>>,
    not_empty: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue {
            inner: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub fn push_tail(&self, task: Box<Task>) {
        self.inner.lock().unwrap().push_back(task);
        self.not_empty.notify_one();
    }

    pub fn push_head(&self, task: Box<Task>) {
        self.inner.lock().unwrap().push_front(task);
        self.not_empty.notify_one();
    }

    pub fn pop_head(&self) -> Option<Box<Task>> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until a task is available or `shutdown` is observed set.
    /// Rechecked on a short poll interval rather than woken precisely,
    /// since `notify_all` on shutdown races harmlessly with this loop.
    pub fn pop_head_blocking(&self, shutdown: &AtomicBool) -> Option<Box<Task>> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(task) = guard.pop_front() {
                return Some(task);
            }
            if shutdown.load(Ordering::Acquire) {
                return None;
            }
            let (g, _) = self
                .not_empty
                .wait_timeout(guard, SHUTDOWN_POLL_INTERVAL)
                .unwrap();
            guard = g;
        }
    }

    /// Waits at most one poll interval for a push or the shutdown flag,
    /// without popping anything itself. Used by the primary executor, which
    /// needs to retry its own *and* the secondaries' queues (via steal) on
    /// every wake rather than only this queue, so it cannot delegate the
    /// whole wait-and-pop sequence to `pop_head_blocking`.
    pub fn wait_for_signal(&self, shutdown: &AtomicBool) {
        let guard = self.inner.lock().unwrap();
        if !guard.is_empty() || shutdown.load(Ordering::Acquire) {
            return;
        }
        let _ = self.not_empty.wait_timeout(guard, SHUTDOWN_POLL_INTERVAL).unwrap();
    }

    pub fn notify_one(&self) {
        self.not_empty.notify_one();
    }

    pub fn notify_all(&self) {
        self.not_empty.notify_all();
    }

    /// Locks the underlying deque for inspection during primary-steal.
    /// Callers must acquire these in ascending queue-index order to avoid
    /// deadlock when multiple secondaries are inspected at once.
    pub(crate) fn lock_raw(&self) -> MutexGuard<'_, VecDeque<Box<Task>>> {
        self.inner.lock().unwrap()
    }
}
