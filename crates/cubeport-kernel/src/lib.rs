#![forbid(unsafe_code)]

//! Cooperative concurrency kernel for the emulated console.
//!
//! Client code that was written against the console SDK's thread, mutex and
//! condition-variable primitives runs against [`Kernel`] unmodified in
//! behavior: threads only lose the CPU at explicit suspension points, wake
//! order within a wait queue is strictly FIFO by enqueue time, and mutexes
//! are recursive with ownership handed to the longest waiter on release.
//!
//! The kernel is an explicit context object rather than process-wide
//! state: independent instances coexist, which keeps tests deterministic.
//! Host threads back the emulated threads, but a single scheduler lock and
//! per-thread parking enforce the one-runner-at-a-time contract.

mod error;
mod sched;
mod sync;

pub use error::{KernelError, Result};
pub use sched::{Kernel, ThreadId, ThreadState, WaitQueue, MIN_STACK_SIZE};
pub use sync::{CondVar, Mutex};
