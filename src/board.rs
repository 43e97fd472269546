//! Board lifecycle and the public task API that operates on it:
//! `create`/`start`/`kill`/`destroy`, plus `task_create`,
//! `blocking_task_create`, `remote_task_create`, and `history_*`.
//!
//! `Board` is the single owner of executor threads, ready queues, message
//! queues, and the history table. Lock acquisition order: board state
//! mutex, then history mutex (independent), then per-queue mutex (ascending
//! index for steal inspection), then message-queue internals (independent),
//! with an exit rendezvous held only during `kill`/`destroy`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::{Config, MAX_SECONDARIES};
use crate::error::BoardError;
use crate::executor::{Executor, Role};
use crate::history::{HistoryRecord, HistoryTable};
use crate::queue::ReadyQueue;
use crate::remote::{MessageQueues, RemoteEnvelope, RemoteResponse};
use crate::task::{self, FunctionDescriptor, Origin, Task, TaskClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoardStatus {
    Created,
    Started,
    ShuttingDown,
    Destroyed,
}

struct BoardState {
    status: BoardStatus,
    task_count: usize,
}

/// The top-level scheduler instance. Single-use:
/// `Created -> Started -> (ShuttingDown) -> Destroyed`.
pub struct Board {
    config: Config,
    state: Mutex<BoardState>,
    history: HistoryTable,
    primary_queue: ReadyQueue,
    secondary_queues: Vec<ReadyQueue>,
    messages: MessageQueues,
    shutdown: AtomicBool,
    round_robin: AtomicUsize,
    executor_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Board {
    /// `secondary_count` must be in `[1, MAX_SECONDARIES]`.
    pub fn create(secondary_count: usize) -> Result<Arc<Board>, BoardError> {
        Board::create_with_config(Config::new(secondary_count))
    }

    pub fn create_with_config(config: Config) -> Result<Arc<Board>, BoardError> {
        if config.secondary_count == 0 || config.secondary_count > MAX_SECONDARIES {
            return Err(BoardError::InvalidSecondaryCount {
                got: config.secondary_count,
                max: MAX_SECONDARIES,
            });
        }

        let secondary_queues = (0..config.secondary_count).map(|_| ReadyQueue::new()).collect();
        log::debug!(
            "board created: {} secondary executor(s), max_tasks={}, stack_size={}",
            config.secondary_count,
            config.max_tasks,
            config.stack_size
        );

        Ok(Arc::new(Board {
            config,
            state: Mutex::new(BoardState {
                status: BoardStatus::Created,
                task_count: 0,
            }),
            history: HistoryTable::new(),
            primary_queue: ReadyQueue::new(),
            secondary_queues,
            messages: MessageQueues::new(),
            shutdown: AtomicBool::new(false),
            round_robin: AtomicUsize::new(0),
            executor_handles: Mutex::new(Vec::new()),
        }))
    }

    /// Spawns the primary and every secondary executor thread. Returns
    /// `false` if the board was already started (or past that point)
    /// instead of spawning a second set of threads.
    ///
    /// Each spawned thread holds its own `Arc<Board>` clone for the entire
    /// lifetime of `Executor::run` (it only returns once `kill` has set the
    /// shutdown flag), so from here until `kill` is called the board's
    /// strong refcount can never reach zero no matter how many other
    /// handles a caller drops. See `impl Drop for Board` below for what that
    /// implies.
    pub fn start(self: &Arc<Board>) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != BoardStatus::Created {
                return false;
            }
            state.status = BoardStatus::Started;
        }

        let mut handles = self.executor_handles.lock().unwrap();
        for idx in 0..self.secondary_queues.len() {
            let board = Arc::clone(self);
            handles.push(std::thread::spawn(move || {
                Executor::new(Role::Secondary(idx), board).run();
            }));
        }
        let board = Arc::clone(self);
        handles.push(std::thread::spawn(move || {
            Executor::new(Role::Primary, board).run();
        }));
        log::info!("board started with {} executor thread(s)", handles.len());
        true
    }

    /// Sets the shutdown flag, wakes every condvar and the message queue,
    /// and joins all executor threads. Idempotent: returns `true` the
    /// first time, `false` thereafter.
    pub fn kill(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != BoardStatus::Started {
                return false;
            }
            state.status = BoardStatus::ShuttingDown;
        }

        self.shutdown.store(true, Ordering::SeqCst);
        self.primary_queue.notify_all();
        for queue in &self.secondary_queues {
            queue.notify_all();
        }
        self.messages.close();

        let handles: Vec<_> = self.executor_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        log::info!("board killed");
        true
    }

    /// Joins threads (calling `kill` first if the caller never did), then
    /// drains every queue and the history table. A no-op if already
    /// destroyed.
    pub fn destroy(&self) {
        let needs_kill = {
            let state = self.state.lock().unwrap();
            state.status == BoardStatus::Started
        };
        if needs_kill {
            self.kill();
        }

        let mut state = self.state.lock().unwrap();
        if state.status == BoardStatus::Destroyed {
            return;
        }
        state.status = BoardStatus::Destroyed;
        drop(state);

        while self.primary_queue.pop_head().is_some() {}
        for queue in &self.secondary_queues {
            while queue.pop_head().is_some() {}
        }
        while self.messages.try_recv_inbound().is_ok() {}
        log::info!("board destroyed");
    }

    fn is_started(&self) -> bool {
        self.state.lock().unwrap().status == BoardStatus::Started
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn shutdown_flag(&self) -> &AtomicBool {
        &self.shutdown
    }

    pub(crate) fn primary_queue(&self) -> &ReadyQueue {
        &self.primary_queue
    }

    pub(crate) fn secondary_queue(&self, idx: usize) -> &ReadyQueue {
        &self.secondary_queues[idx]
    }

    pub(crate) fn secondary_count(&self) -> usize {
        self.secondary_queues.len()
    }

    pub(crate) fn messages(&self) -> &MessageQueues {
        &self.messages
    }

    pub(crate) fn history(&self) -> &HistoryTable {
        &self.history
    }

    /// The number of currently live, counted tasks. Exposed read-only;
    /// mutation only happens via `reserve_task_slot`/`retire_task`, both
    /// under the board mutex.
    pub fn task_count(&self) -> usize {
        self.state.lock().unwrap().task_count
    }

    fn reserve_task_slot(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status != BoardStatus::Started {
            return false;
        }
        if state.task_count >= self.config.max_tasks {
            return false;
        }
        state.task_count += 1;
        true
    }

    /// Called once a task (that reserved a slot) completes.
    pub(crate) fn retire_task(&self, task: &Task) {
        if task.counts_against_quota {
            self.release_slot();
        }
    }

    fn release_slot(&self) {
        let mut state = self.state.lock().unwrap();
        state.task_count = state.task_count.saturating_sub(1);
    }

    fn pick_origin(&self, class: TaskClass) -> Origin {
        match class {
            TaskClass::Priority | TaskClass::Primary => Origin::Primary,
            TaskClass::Secondary => {
                let n = self.secondary_queues.len();
                let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % n;
                Origin::Secondary(idx)
            }
        }
    }

    /// Whether `task` should jump to the head of the primary queue: it is a
    /// priority-class task, and `priority_reinsertion_at_head` (on by
    /// default, per spec.md §6's tunables) hasn't been configured off.
    fn jumps_the_line(&self, task: &Task) -> bool {
        task.class == TaskClass::Priority && self.config.priority_reinsertion_at_head
    }

    /// Places a freshly created (never-yielded) task on its class's queue.
    /// Also used by the executor to admit a blocking child once its parent
    /// has been attached.
    pub(crate) fn enqueue_new(&self, task: Box<Task>) {
        match task.class {
            TaskClass::Priority | TaskClass::Primary => {
                if self.jumps_the_line(&task) {
                    self.primary_queue.push_head(task);
                } else {
                    self.primary_queue.push_tail(task);
                }
            }
            TaskClass::Secondary => {
                if let Origin::Secondary(idx) = task.origin {
                    self.secondary_queues[idx].push_tail(task);
                    if self.config.wake_primary_on_secondary_push {
                        self.primary_queue.notify_one();
                    }
                }
            }
        }
    }

    /// Requeues a task that yielded (or a parent whose blocking child just
    /// completed, or an originator whose remote response just arrived)
    /// onto the queue it came from -- head for priority (unless configured
    /// off), tail otherwise.
    pub(crate) fn requeue_on_origin(&self, task: Box<Task>) {
        match task.origin {
            Origin::Primary => {
                if self.jumps_the_line(&task) {
                    self.primary_queue.push_head(task);
                } else {
                    self.primary_queue.push_tail(task);
                }
            }
            Origin::Secondary(idx) => {
                self.secondary_queues[idx].push_tail(task);
                if self.config.wake_primary_on_secondary_push {
                    self.primary_queue.notify_one();
                }
            }
        }
    }

    /// spec.md §6 `task_create`.
    pub fn task_create(
        &self,
        class: TaskClass,
        function: FunctionDescriptor,
        args: Option<Box<dyn Any + Send>>,
    ) -> bool {
        if !self.reserve_task_slot() {
            return false;
        }
        let origin = self.pick_origin(class);
        let task = match Task::new(class, origin, function, args, self.config.stack_size, true) {
            Ok(task) => task,
            Err(err) => {
                log::warn!("task_create failed to allocate coroutine: {err}");
                self.release_slot();
                return false;
            }
        };
        self.enqueue_new(task);
        true
    }

    /// spec.md §6 `blocking_task_create`. Must be called from within a
    /// running task; the child does not reserve a concurrent-task slot
    /// (spec.md §3).
    pub fn blocking_task_create(
        &self,
        class: TaskClass,
        function: FunctionDescriptor,
        args: Option<Box<dyn Any + Send>>,
    ) -> bool {
        if !task::in_task() {
            log::warn!("blocking_task_create called outside a running task");
            return false;
        }
        if !self.is_started() {
            return false;
        }

        let origin = self.pick_origin(class);
        let child = match Task::new(class, origin, function, args, self.config.stack_size, false) {
            Ok(child) => child,
            Err(err) => {
                log::warn!("blocking_task_create failed to allocate coroutine: {err}");
                return false;
            }
        };
        task::stash_pending_child(child);
        task::suspend_current(crate::task::YieldReason::BlockingChild);
        true
    }

    /// spec.md §6 `remote_task_create`. Returns `None` on misuse (not
    /// called from within a task, or the board isn't running); otherwise a
    /// [`RemoteResponse`] handle in place of the original's
    /// `response_ptr`/`response_size` out-parameters.
    pub fn remote_task_create(
        &self,
        message: impl Into<String>,
        blocking: bool,
    ) -> Option<RemoteResponse> {
        if !task::in_task() {
            log::warn!("remote_task_create called outside a running task");
            return None;
        }
        if !self.is_started() {
            return None;
        }

        let envelope: Arc<RemoteEnvelope> = Arc::new(RemoteEnvelope::new(message, blocking));
        self.messages.send_outbound(envelope.clone());
        let response = RemoteResponse::new(envelope.response.clone());
        task::stash_pending_envelope(envelope);

        let reason = if blocking {
            crate::task::YieldReason::RemoteBlocking
        } else {
            crate::task::YieldReason::RemoteNonBlocking
        };
        task::suspend_current(reason);
        Some(response)
    }

    /// spec.md §6 `history_print`: one ASCII line per function.
    pub fn history_print(&self, sink: impl std::io::Write) -> std::io::Result<()> {
        self.history.print_records(sink)
    }

    /// Ambient addition (SPEC_FULL §6): structured access to the same data
    /// `history_print` emits as text.
    pub fn history_snapshot(&self) -> Vec<HistoryRecord> {
        self.history.snapshot()
    }

    /// A clone of the outbound receiver, for driving an external
    /// [`crate::remote::RemoteAdapter`] (spec.md §6 Adapter contract).
    pub fn outbound_receiver(&self) -> crossbeam_channel::Receiver<Arc<RemoteEnvelope>> {
        self.messages.outbound_receiver()
    }

    /// A clone of the inbound sender, for an external adapter to deliver
    /// responses back to the sequencer (spec.md §6 Adapter contract).
    pub fn inbound_sender(&self) -> crossbeam_channel::Sender<Arc<RemoteEnvelope>> {
        self.messages.inbound_sender()
    }
}

impl Drop for Board {
    /// Covers the two cases this destructor can actually run in: a board
    /// that was created but never started (nothing to join, `destroy`
    /// drains the still-empty queues and returns), and one that was started
    /// and already `kill`ed but never `destroy`ed (this joins nothing new --
    /// `kill` already did -- and just runs the queue/history drain the
    /// caller skipped).
    ///
    /// This is *not* a safety net for a started board whose caller dropped
    /// every handle without calling `kill`: every executor thread spawned by
    /// `start` holds its own `Arc<Board>` clone for as long as `Executor::run`
    /// is running, which is until the shutdown flag `kill` sets is observed.
    /// So while `status == Started` and `kill` has not been called, the
    /// strong refcount cannot reach zero and `Drop::drop` cannot run at all
    /// -- there is no point in this impl where it could intervene. A board
    /// started and never killed leaks its threads and queues for the
    /// process's lifetime; callers must call `kill` (directly, or via
    /// whatever owns the board) to release one. `destroy` itself still
    /// checks for a started-but-not-yet-killed board, since it is also
    /// reachable from a direct caller who still holds other strong handles
    /// -- just never from here.
    fn drop(&mut self) {
        self.destroy();
    }
}
