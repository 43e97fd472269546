//! Property-based checks for invariants that should hold for any task count
//! or argument payload, not just the handful of cases the other integration
//! tests exercise by hand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use tboard::{Board, FunctionDescriptor, TaskClass};

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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Whatever number of non-yielding tasks are submitted, the board's
    /// concurrent-task counter always returns to zero and the history
    /// table's completion count matches exactly (spec.md §3 quota
    /// invariant, §4.7 completions bookkeeping).
    #[test]
    fn task_count_and_history_agree_with_submission_count(n in 1usize..40) {
        let board = Board::create(2).unwrap();
        board.start();

        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..n {
            let completed = completed.clone();
            let fd = FunctionDescriptor::new("proptest_counted", move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
            prop_assert!(board.task_create(TaskClass::Secondary, fd, None));
        }

        prop_assert!(wait_until(
            || completed.load(Ordering::SeqCst) == n,
            Duration::from_secs(5)
        ));
        prop_assert!(wait_until(|| board.task_count() == 0, Duration::from_secs(2)));

        let snapshot = board.history_snapshot();
        let record = snapshot.iter().find(|r| r.function == "proptest_counted");
        prop_assert!(record.is_some());
        prop_assert_eq!(record.unwrap().completions, n as u64);

        board.kill();
        board.destroy();
    }

    /// An arbitrary `i32` payload survives a yield-then-mutate round trip
    /// unchanged in shape: whatever value goes in via `args`, the same type
    /// comes back out, mutated exactly by the task body (spec.md §4.9).
    #[test]
    fn identity_plus_one_round_trips_through_a_yield(start in any::<i32>()) {
        let board = Board::create(1).unwrap();
        board.start();

        let result = Arc::new(std::sync::Mutex::new(None::<i32>));
        let result_for_task = result.clone();
        let fd = FunctionDescriptor::new("proptest_increment", move || {
            let v = tboard::task_get_args_mut::<i32>().unwrap();
            *v = v.wrapping_add(1);
            tboard::task_yield();
            *result_for_task.lock().unwrap() = Some(*v);
        });
        prop_assert!(board.task_create(TaskClass::Primary, fd, Some(Box::new(start))));

        prop_assert!(wait_until(|| result.lock().unwrap().is_some(), Duration::from_secs(2)));
        prop_assert_eq!(result.lock().unwrap().unwrap(), start.wrapping_add(1));

        board.kill();
        board.destroy();
    }
}
