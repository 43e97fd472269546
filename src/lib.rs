//! `tboard`: a cooperative, multi-queue task board.
//!
//! An in-process scheduler that multiplexes many short-lived user tasks
//! (resumable coroutines with private stacks) onto a small fixed pool of
//! worker threads, with priority classes, blocking child tasks, and an
//! out-of-process "remote task" facility coordinated through two message
//! queues.
//!
//! # Shape
//!
//! - [`Board`] owns one primary and up to [`config::MAX_SECONDARIES`]
//!   secondary executors, the ready queues they dispatch from, the
//!   outbound/inbound message queues, and the execution-history table.
//! - [`task::task_create`]-equivalent: [`Board::task_create`] enqueues a
//!   unit of work; [`task::task_yield`] suspends it cooperatively;
//!   [`task::task_get_args`]/[`task::task_get_args_mut`] retrieve its
//!   argument blob from inside the running task.
//! - [`Board::blocking_task_create`] spawns a child that substitutes for
//!   its caller in the scheduling budget until it completes.
//! - [`Board::remote_task_create`] hands a message to an external
//!   [`remote::RemoteAdapter`] and (optionally) waits for its response.
//!
//! # Example
//!
//! ```no_run
//! use tboard::{Board, FunctionDescriptor, TaskClass};
//!
//! let board = Board::create(2).unwrap();
//! board.start();
//!
//! let greet = FunctionDescriptor::new("greet", || {
//!     println!("hello from a task");
//! });
//! board.task_create(TaskClass::Primary, greet, None);
//!
//! std::thread::sleep(std::time::Duration::from_millis(50));
//! board.kill();
//! board.destroy();
//! ```

mod board;
pub mod config;
pub mod error;
mod executor;
pub mod history;
mod queue;
pub mod remote;
pub mod task;

pub use board::Board;
pub use config::Config;
pub use error::BoardError;
pub use history::HistoryRecord;
pub use remote::{EchoAdapter, RemoteAdapter, RemoteResponse};
pub use task::{
    task_get_args, task_get_args_mut, task_yield, FunctionDescriptor, Origin, TaskClass,
    TaskStatus, YieldReason,
};
