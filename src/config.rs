//! Tunables. A board reads these once at construction time; a caller who
//! wants more than one secondary count or stack size in the same process
//! can build a [`Config`] directly instead of relying on the module-level
//! defaults.

/// Hard ceiling on concurrently live, counted tasks.
pub const MAX_TASKS: usize = 65_536;

/// Maximum number of secondary executors a board may have.
pub const MAX_SECONDARIES: usize = 10;

/// Default private stack size for a task's coroutine, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 57_344;

/// Maximum ASCII message length for a remote-task request, excluding the
/// terminator.
pub const MAX_MESSAGE_LEN: usize = 254;

/// Per-board configuration. `Config::new` picks sensible defaults; the
/// `with_*` builders let a caller deviate per board.
#[derive(Debug, Clone)]
pub struct Config {
    pub secondary_count: usize,
    pub stack_size: usize,
    pub max_tasks: usize,
    /// Priority-class tasks are pushed to the head of the primary queue
    /// instead of the tail, both on creation and on every requeue
    /// (`Board::enqueue_new`/`requeue_on_origin`). Defaults to `true`,
    /// matching spec.md §6's tunable of the same name; setting it `false`
    /// makes priority-class tasks behave exactly like primary-class ones.
    pub priority_reinsertion_at_head: bool,
    /// A push onto a secondary queue also wakes the primary so it can
    /// consider stealing from it.
    pub wake_primary_on_secondary_push: bool,
}

impl Config {
    pub fn new(secondary_count: usize) -> Self {
        Config {
            secondary_count,
            stack_size: DEFAULT_STACK_SIZE,
            max_tasks: MAX_TASKS,
            priority_reinsertion_at_head: true,
            wake_primary_on_secondary_push: true,
        }
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    pub fn with_priority_reinsertion_at_head(mut self, enabled: bool) -> Self {
        self.priority_reinsertion_at_head = enabled;
        self
    }

    pub fn with_wake_primary_on_secondary_push(mut self, enabled: bool) -> Self {
        self.wake_primary_on_secondary_push = enabled;
        self
    }
}
