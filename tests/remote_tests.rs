//! Remote-task rendezvous, driven end to end through a real adapter thread
//! (spec.md §8 scenario 4).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tboard::{Board, EchoAdapter, FunctionDescriptor, TaskClass};

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
fn blocking_remote_request_is_answered_by_the_echo_adapter() {
    let board = Board::create(1).unwrap();
    board.start();

    let outbound = board.outbound_receiver();
    let inbound = board.inbound_sender();
    let adapter_thread =
        std::thread::spawn(move || tboard::remote::run_adapter(outbound, inbound, EchoAdapter));

    let result: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let result_for_task = result.clone();
    let board_for_task = board.clone();
    let fd = FunctionDescriptor::new("blocking_remote_caller", move || {
        let response = board_for_task.remote_task_create("ping", true).unwrap();
        *result_for_task.lock().unwrap() = Some(response.get());
    });
    assert!(board.task_create(TaskClass::Primary, fd, None));

    assert!(wait_until(|| result.lock().unwrap().is_some(), Duration::from_secs(2)));
    assert_eq!(result.lock().unwrap().as_deref(), Some(b"ping".as_slice()));

    board.kill();
    board.destroy();
    let _ = adapter_thread.join();
}

#[test]
fn non_blocking_remote_request_lets_the_caller_continue_and_poll_later() {
    let board = Board::create(1).unwrap();
    board.start();

    let outbound = board.outbound_receiver();
    let inbound = board.inbound_sender();
    let adapter_thread =
        std::thread::spawn(move || tboard::remote::run_adapter(outbound, inbound, EchoAdapter));

    let handle: Arc<Mutex<Option<tboard::RemoteResponse>>> = Arc::new(Mutex::new(None));
    let handle_for_task = handle.clone();
    let continued = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let continued_for_task = continued.clone();
    let board_for_task = board.clone();
    let fd = FunctionDescriptor::new("non_blocking_remote_caller", move || {
        let response = board_for_task.remote_task_create("pong", false).unwrap();
        *handle_for_task.lock().unwrap() = Some(response);
        continued_for_task.store(true, std::sync::atomic::Ordering::SeqCst);
    });
    assert!(board.task_create(TaskClass::Primary, fd, None));

    assert!(wait_until(
        || continued.load(std::sync::atomic::Ordering::SeqCst),
        Duration::from_secs(2)
    ));

    let response = handle.lock().unwrap().clone().unwrap();
    assert!(wait_until(|| response.try_get().is_some(), Duration::from_secs(2)));
    assert_eq!(response.try_get().as_deref(), Some(b"pong".as_slice()));

    board.kill();
    board.destroy();
    let _ = adapter_thread.join();
}
