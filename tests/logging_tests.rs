//! `log`/`env_logger` is process-global state, same as the shared
//! `TaskManager` singleton Martos's own test suite serializes with
//! `sequential_test`; these tests do the same thing for the same reason.

use sequential_test::sequential;

use tboard::{Board, FunctionDescriptor, TaskClass};

fn init_logging() {
    let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
}

#[test]
#[sequential]
fn board_lifecycle_logs_without_panicking_under_a_real_logger() {
    init_logging();

    let board = Board::create(1).unwrap();
    board.start();
    let fd = FunctionDescriptor::new("log_smoke_test", || {});
    assert!(board.task_create(TaskClass::Primary, fd, None));
    std::thread::sleep(std::time::Duration::from_millis(50));
    board.kill();
    board.destroy();
}

#[test]
#[sequential]
fn misuse_paths_log_a_warning_instead_of_panicking() {
    init_logging();

    // `blocking_task_create`/`remote_task_create` called outside a running
    // task should log a warning and return a failure value, never panic
    // (spec.md §7's "Misuse" error kind).
    let board = Board::create(1).unwrap();
    board.start();
    let fd = FunctionDescriptor::new("noop", || {});
    assert!(!board.blocking_task_create(TaskClass::Primary, fd.clone(), None));
    assert!(board.remote_task_create("unreachable", true).is_none());
    board.kill();
    board.destroy();
}
