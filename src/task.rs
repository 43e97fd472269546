//! Task objects and the coroutine wrapper around them. A [`Task`] owns a
//! `corosensei` stackful coroutine and the bits of state an
//! [`crate::executor::Executor`] needs to dispatch it: its class, origin
//! queue, accumulated CPU time and yield count, and (for blocking children)
//! the parent it substitutes for.
//!
//! `task_yield`/`task_get_args` are free functions that reach the coroutine
//! currently resuming on this thread through a thread-local rather than an
//! explicit parameter -- a task body takes no arguments of its own, so
//! there is nowhere else to put a handle to the scheduler.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

use crate::error::BoardError;
use crate::remote::RemoteEnvelope;

/// Classification a task is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    /// Head-jumps the primary queue.
    Priority,
    /// Tail of the primary queue.
    Primary,
    /// Tail of the least-loaded secondary queue.
    Secondary,
}

/// Lifecycle status. Transitions are monotone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Initialized,
    Running,
    Completed,
}

/// Which ready queue a task currently belongs to, so a yield or requeue
/// returns it to the same place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Primary,
    Secondary(usize),
}

/// The side channel a task sets (via `task_yield`, `Board::blocking_task_create`,
/// or `Board::remote_task_create`) before suspending, read by the executor to
/// decide how to dispose of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldReason {
    Plain,
    BlockingChild,
    RemoteNonBlocking,
    RemoteBlocking,
}

/// A callable keyed by a symbolic name for history bookkeeping. Cheap to
/// clone: the name is an `Arc<str>` and the body an `Arc<dyn Fn>`.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: Arc<str>,
    func: Arc<dyn Fn() + Send + Sync>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<Arc<str>>, func: impl Fn() + Send + Sync + 'static) -> Self {
        FunctionDescriptor {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Coroutine body type. Takes no input, yields a [`YieldReason`], returns
/// nothing -- a task communicates results through its args blob, not a
/// return value.
type TaskCoroutine = Coroutine<(), YieldReason, ()>;

/// Shared cell through which the coroutine body publishes its `Yielder`
/// pointer the first (and only) time it runs, so later resumes -- which
/// re-enter the paused body rather than calling it again -- can still find
/// it. `corosensei::Yielder` is not `Send`/`Sync`; this cell crosses threads
/// only while no one is dereferencing it, the same invariant `Task` itself
/// relies on (see its `unsafe impl Send` below).
struct YielderCell(Cell<Option<*const Yielder<(), YieldReason>>>);
unsafe impl Send for YielderCell {}
unsafe impl Sync for YielderCell {}

thread_local! {
    static CURRENT_YIELDER: Cell<Option<*const Yielder<(), YieldReason>>> = const { Cell::new(None) };
    static CURRENT_ARGS: Cell<Option<*mut (dyn Any + Send)>> = const { Cell::new(None) };
    static CURRENT_META: RefCell<Option<TaskMeta>> = const { RefCell::new(None) };
}

/// Per-resumption scratch state read/written through the thread-locals
/// above. Populated by the executor immediately before `resume`, consumed
/// immediately after.
struct TaskMeta {
    pending_child: Option<Box<Task>>,
    pending_envelope: Option<Arc<RemoteEnvelope>>,
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// One unit of user work. Owns its coroutine, its argument blob, and -- for
/// a blocking child's parent -- the parent it substitutes for.
pub struct Task {
    pub id: u64,
    pub class: TaskClass,
    pub status: TaskStatus,
    pub origin: Origin,
    pub function: FunctionDescriptor,
    pub args: Option<Box<dyn Any + Send>>,
    pub cpu_time: Duration,
    pub yields: u64,
    /// Whether this task reserved a slot in the board's concurrent-task
    /// counter. `false` for blocking children, which substitute for their
    /// parent's slot in the budget instead of reserving their own.
    pub(crate) counts_against_quota: bool,
    pub(crate) history_key: Option<Arc<str>>,
    /// The blocked parent this task (as a blocking child) substitutes for.
    /// Owned here because the parent is parked nowhere else while waiting:
    /// the child's `parent` field is the one place that must keep it alive.
    pub parent: Option<Box<Task>>,
    coroutine: TaskCoroutine,
    yielder_cell: Arc<YielderCell>,
}

// Safety: a `Task`'s coroutine and thread-local-published `Yielder` pointer
// are only ever touched by the single executor thread currently resuming
// it -- the push/pop protocol on `ReadyQueue` guarantees a task is never in
// two places (and so touched by two threads) at once.
unsafe impl Send for Task {}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        class: TaskClass,
        origin: Origin,
        function: FunctionDescriptor,
        args: Option<Box<dyn Any + Send>>,
        stack_size: usize,
        counts_against_quota: bool,
    ) -> Result<Box<Task>, BoardError> {
        let stack = DefaultStack::new(stack_size).map_err(|_| BoardError::StackAllocation)?;
        let yielder_cell = Arc::new(YielderCell(Cell::new(None)));
        let body_func = function.func.clone();
        let body_cell = yielder_cell.clone();
        let coroutine = Coroutine::with_stack(stack, move |yielder: &Yielder<(), YieldReason>, _input: ()| {
            let ptr = yielder as *const _;
            body_cell.0.set(Some(ptr));
            CURRENT_YIELDER.with(|c| c.set(Some(ptr)));
            (body_func)();
            CURRENT_YIELDER.with(|c| c.set(None));
        });

        Ok(Box::new(Task {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            class,
            status: TaskStatus::Initialized,
            origin,
            function,
            args,
            cpu_time: Duration::ZERO,
            yields: 0,
            counts_against_quota,
            history_key: None,
            parent: None,
            coroutine,
            yielder_cell,
        }))
    }

    /// Test-only constructor used by unit tests that only need a task to
    /// exist in a queue, not to actually run meaningful work.
    #[cfg(test)]
    pub(crate) fn new_for_test(
        id: u64,
        class: TaskClass,
        function: FunctionDescriptor,
        origin: Origin,
    ) -> Box<Task> {
        let mut task = Task::new(
            class,
            origin,
            function,
            None,
            crate::config::DEFAULT_STACK_SIZE,
            true,
        )
        .expect("test stack allocation");
        task.id = id;
        task
    }

    pub fn function_name(&self) -> &str {
        self.function.name()
    }

    /// Resumes this task's coroutine, publishing the thread-locals the
    /// coroutine body and `task_yield`/`task_get_args`/blocking/remote
    /// helpers read, and tearing them down again before returning control
    /// to the executor.
    pub(crate) fn resume(&mut self) -> TaskResumeOutcome {
        CURRENT_YIELDER.with(|c| c.set(self.yielder_cell.0.get()));
        CURRENT_ARGS.with(|c| {
            c.set(
                self.args
                    .as_deref_mut()
                    .map(|b| b as *mut (dyn Any + Send)),
            )
        });
        CURRENT_META.with(|c| {
            *c.borrow_mut() = Some(TaskMeta {
                pending_child: None,
                pending_envelope: None,
            })
        });

        let result = self.coroutine.resume(());

        CURRENT_ARGS.with(|c| c.set(None));
        CURRENT_YIELDER.with(|c| c.set(None));
        let meta = CURRENT_META.with(|c| c.borrow_mut().take());

        match result {
            CoroutineResult::Return(()) => TaskResumeOutcome::Completed,
            CoroutineResult::Yield(reason) => TaskResumeOutcome::Yielded {
                reason,
                pending_child: meta.and_then(|m| m.pending_child),
                pending_envelope: meta.and_then(|m| m.pending_envelope),
            },
        }
    }
}

/// What happened when an executor resumed a task's coroutine.
pub(crate) enum TaskResumeOutcome {
    Completed,
    Yielded {
        reason: YieldReason,
        pending_child: Option<Box<Task>>,
        pending_envelope: Option<Arc<RemoteEnvelope>>,
    },
}

/// Suspends the currently-running coroutine back to its executor with
/// [`YieldReason::Plain`]. A no-op (logged) outside a task.
pub fn task_yield() {
    suspend_current(YieldReason::Plain);
}

/// Returns the argument blob attached to the currently-running task,
/// downcast to `T`. `None` if there is no args blob, the blob is a
/// different type, or this is called outside a task.
///
/// # Safety notes
/// The returned reference is sourced from a thread-local raw pointer valid
/// only while the current task is resuming. Do not retain it across a
/// `task_yield`/blocking/remote call -- by the time such a call returns,
/// the pointer has been refreshed by (possibly several) other tasks on this
/// thread.
pub fn task_get_args<T: 'static>() -> Option<&'static T> {
    CURRENT_ARGS.with(|c| {
        c.get()
            .and_then(|ptr| unsafe { (*ptr).downcast_ref::<T>() })
    })
}

/// Mutable counterpart of [`task_get_args`], for the common pattern of a
/// blocking child writing its result into a buffer the parent's args also
/// reference. Interior mutability/aliasing of the pointed-to buffer across
/// the parent/child boundary is the caller's responsibility, not something
/// this crate can check.
pub fn task_get_args_mut<T: 'static>() -> Option<&'static mut T> {
    CURRENT_ARGS.with(|c| {
        c.get()
            .and_then(|ptr| unsafe { (*ptr).downcast_mut::<T>() })
    })
}

pub(crate) fn in_task() -> bool {
    CURRENT_YIELDER.with(|c| c.get().is_some())
}

pub(crate) fn stash_pending_child(child: Box<Task>) {
    CURRENT_META.with(|c| {
        if let Some(meta) = c.borrow_mut().as_mut() {
            meta.pending_child = Some(child);
        }
    });
}

pub(crate) fn stash_pending_envelope(envelope: Arc<RemoteEnvelope>) {
    CURRENT_META.with(|c| {
        if let Some(meta) = c.borrow_mut().as_mut() {
            meta.pending_envelope = Some(envelope);
        }
    });
}

pub(crate) fn suspend_current(reason: YieldReason) {
    CURRENT_YIELDER.with(|c| match c.get() {
        Some(ptr) => {
            unsafe { &*ptr }.suspend(reason);
        }
        None => log::warn!("task suspend requested outside a running task; ignoring"),
    });
}
