//! The executor loop: dequeue, resume, classify the yield reason,
//! requeue/destroy/stash. The primary executor additionally steals from
//! secondary queues when its own is empty.

use std::time::Instant;

use crate::board::Board;
use crate::remote;
use crate::task::{Origin, Task, TaskResumeOutcome, TaskStatus, YieldReason};

/// Which ready queue this executor owns. Only the primary role ever steals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Primary,
    Secondary(usize),
}

pub(crate) struct Executor {
    role: Role,
    board: std::sync::Arc<Board>,
    #[cfg(feature = "diagnostics")]
    steals: std::sync::atomic::AtomicU64,
}

impl Executor {
    pub fn new(role: Role, board: std::sync::Arc<Board>) -> Self {
        Executor {
            role,
            board,
            #[cfg(feature = "diagnostics")]
            steals: std::sync::atomic::AtomicU64::new(0),
        }
    }

    #[cfg(feature = "diagnostics")]
    pub fn steal_count(&self) -> u64 {
        self.steals.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Runs the dispatch loop until the board's shutdown flag is observed,
    /// checked once per iteration boundary.
    pub fn run(&self) {
        loop {
            // Drain any remote responses that arrived since the last pass,
            // before popping the next task to run.
            let board = &self.board;
            remote::drain_inbound(board.messages(), |task| board.requeue_on_origin(task));

            let Some(mut task) = self.next_task() else {
                if board.is_shutdown() {
                    return;
                }
                continue;
            };

            task.status = TaskStatus::Running;
            if task.history_key.is_none() {
                task.history_key = Some(board.history().key_for(task.function_name()));
            }
            let start = Instant::now();
            let outcome = task.resume();
            let elapsed = start.elapsed();
            task.cpu_time += elapsed;

            match outcome {
                TaskResumeOutcome::Completed => {
                    task.status = TaskStatus::Completed;
                    let key = task.history_key.clone();
                    if let Some(key) = &key {
                        board.history().record_completion(key, task.cpu_time, task.yields);
                    }
                    let parent = task.parent.take();
                    board.retire_task(&task);
                    if let Some(parent) = parent {
                        board.requeue_on_origin(parent);
                    }
                }
                TaskResumeOutcome::Yielded {
                    reason,
                    pending_child,
                    pending_envelope,
                } => {
                    task.yields += 1;
                    if let Some(key) = &task.history_key {
                        if task.yields == 1 {
                            board.history().record_execution_start(key);
                        }
                        board.history().record_yield(key);
                    }

                    match reason {
                        YieldReason::Plain => {
                            board.requeue_on_origin(task);
                        }
                        YieldReason::BlockingChild => {
                            let mut child = pending_child
                                .expect("blocking-child yield without a pending child task");
                            child.parent = Some(task);
                            board.enqueue_new(child);
                        }
                        YieldReason::RemoteNonBlocking => {
                            board.requeue_on_origin(task);
                        }
                        YieldReason::RemoteBlocking => {
                            let envelope = pending_envelope
                                .expect("remote-blocking yield without a pending envelope");
                            *envelope.parked.lock().unwrap() = Some(task);
                        }
                    }
                }
            }

            if board.is_shutdown() {
                return;
            }
        }
    }

    /// Pops from this executor's own queue, or -- for the primary, when its
    /// queue is empty -- steals from the fullest non-empty secondary.
    ///
    /// Per spec.md §4.3 step 1, "if still no task and not shutting down,
    /// wait on the condition variable; on wake, retry" means retrying the
    /// *whole* step -- own queue, then steal -- not just re-checking the
    /// primary's own queue. A secondary-only push only wakes the primary's
    /// condvar (`wake_primary_on_secondary_push`); if the primary's wait
    /// only ever re-polled its own queue, it would sleep through that wake
    /// and never notice the secondary backlog it was woken to steal from.
    /// So the primary loops the own-queue/steal pair itself, waiting one
    /// poll interval between attempts, instead of delegating to
    /// `pop_head_blocking`, which only retries a single queue.
    fn next_task(&self) -> Option<Box<Task>> {
        let board = &self.board;
        match self.role {
            Role::Primary => loop {
                if let Some(task) = board.primary_queue().pop_head() {
                    return Some(task);
                }
                if let Some(task) = self.try_steal() {
                    return Some(task);
                }
                if board.is_shutdown() {
                    return None;
                }
                board.primary_queue().wait_for_signal(board.shutdown_flag());
            },
            Role::Secondary(idx) => board
                .secondary_queue(idx)
                .pop_head_blocking(board.shutdown_flag()),
        }
    }

    /// Primary-only: locks every secondary queue in ascending index order,
    /// picks the fullest non-empty one, and steals its head task. The
    /// task's `Origin` is left pointing at that secondary queue, so it is
    /// returned there on its next yield rather than migrating permanently.
    fn try_steal(&self) -> Option<Box<Task>> {
        let board = &self.board;
        let n = board.secondary_count();
        let mut guards: Vec<_> = (0..n).map(|i| board.secondary_queue(i).lock_raw()).collect();

        let fullest = guards
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.is_empty())
            .max_by_key(|(_, q)| q.len())
            .map(|(idx, _)| idx);

        let Some(idx) = fullest else {
            return None;
        };
        let task = guards[idx].pop_front();
        drop(guards);

        #[cfg(feature = "diagnostics")]
        if task.is_some() {
            self.steals.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }

        debug_assert!(matches!(
            task.as_ref().map(|t| t.origin),
            None | Some(Origin::Secondary(_))
        ));
        task
    }
}
