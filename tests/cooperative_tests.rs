//! Board-level integration tests: lifecycle, scheduling order, blocking
//! children, and the history table observed from outside the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tboard::{Board, Config, FunctionDescriptor, TaskClass};

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn priority_task_drains_ahead_of_queued_primary_tasks() {
    let board = Board::create(1).unwrap();

    // Tasks created before `start` sit on their queues until the executor
    // threads are spawned, so the interleaving below is deterministic: all
    // three are queued first, then the board starts draining them.
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let record = |order: Arc<Mutex<Vec<&'static str>>>, label: &'static str| {
        FunctionDescriptor::new(label, move || order.lock().unwrap().push(label))
    };

    assert!(board.task_create(TaskClass::Primary, record(order.clone(), "primary-1"), None));
    assert!(board.task_create(TaskClass::Primary, record(order.clone(), "primary-2"), None));
    assert!(board.task_create(TaskClass::Priority, record(order.clone(), "priority"), None));

    board.start();
    assert!(wait_until(|| order.lock().unwrap().len() == 3, Duration::from_secs(2)));
    board.kill();
    board.destroy();

    let finished = order.lock().unwrap().clone();
    assert_eq!(finished[0], "priority");
}

#[test]
fn secondary_tasks_spread_across_executors_and_all_complete() {
    let board = Board::create(3).unwrap();
    board.start();

    const N: usize = 64;
    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..N {
        let completed = completed.clone();
        let fd = FunctionDescriptor::new("secondary_worker", move || {
            completed.fetch_add(1, Ordering::SeqCst);
        });
        assert!(board.task_create(TaskClass::Secondary, fd, None));
    }

    assert!(wait_until(
        || completed.load(Ordering::SeqCst) == N,
        Duration::from_secs(5)
    ));
    assert!(wait_until(|| board.task_count() == 0, Duration::from_secs(2)));

    board.kill();
    board.destroy();
}

#[test]
fn history_snapshot_counts_every_completion() {
    let board = Board::create(2).unwrap();
    board.start();

    const N: usize = 20;
    for _ in 0..N {
        let fd = FunctionDescriptor::new("counted_fn", || {});
        assert!(board.task_create(TaskClass::Primary, fd, None));
    }

    assert!(wait_until(
        || {
            board
                .history_snapshot()
                .iter()
                .any(|r| r.function == "counted_fn" && r.completions == N as u64)
        },
        Duration::from_secs(3)
    ));

    board.kill();
    board.destroy();
}

#[test]
fn blocking_child_runs_and_releases_parent_without_reserving_a_slot() {
    let mut config = Config::new(1);
    config.max_tasks = 1;
    let board = Board::create_with_config(config).unwrap();
    board.start();

    let child_ran = Arc::new(AtomicUsize::new(0));
    let parent_finished = Arc::new(AtomicUsize::new(0));

    let child_ran_for_parent = child_ran.clone();
    let parent_finished_for_parent = parent_finished.clone();
    let board_for_parent = board.clone();
    let parent_fn = FunctionDescriptor::new("blocking_parent", move || {
        let child_ran = child_ran_for_parent.clone();
        let child_fn = FunctionDescriptor::new("blocking_child", move || {
            child_ran.fetch_add(1, Ordering::SeqCst);
        });
        assert!(board_for_parent.blocking_task_create(TaskClass::Primary, child_fn, None));
        parent_finished_for_parent.fetch_add(1, Ordering::SeqCst);
    });

    // max_tasks == 1: if the child reserved its own slot this would be
    // rejected outright, proving blocking children never touch the quota.
    assert!(board.task_create(TaskClass::Primary, parent_fn, None));
    assert!(wait_until(
        || parent_finished.load(Ordering::SeqCst) == 1,
        Duration::from_secs(2)
    ));
    assert_eq!(child_ran.load(Ordering::SeqCst), 1);
    assert!(wait_until(|| board.task_count() == 0, Duration::from_secs(1)));

    board.kill();
    board.destroy();
}

#[test]
#[ignore = "timing-sensitive: exercises shutdown while a task is mid-yield-loop (spec scenario 3)"]
fn shutdown_completes_promptly_with_a_perpetually_yielding_task() {
    let board = Board::create(1).unwrap();
    board.start();

    let fd = FunctionDescriptor::new("forever_yielder", || loop {
        tboard::task_yield();
    });
    assert!(board.task_create(TaskClass::Primary, fd, None));
    std::thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    board.kill();
    board.destroy();
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[cfg(feature = "diagnostics")]
#[test]
#[ignore = "requires contended secondary queues to force a steal; run with --ignored"]
fn work_stealing_is_observable_in_diagnostics_builds() {
    // Scenario 6 of the test plan: a secondary executor sits idle while the
    // other secondary queue backs up, so the primary should eventually
    // steal from it. Exercised manually since it depends on scheduling
    // timing rather than a deterministic invariant.
}
