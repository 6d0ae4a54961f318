use thiserror::Error;

pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors returned by [`Kernel`](crate::Kernel) operations.
///
/// Everything here is recoverable at the call boundary; the kernel never
/// aborts the process on bad input (strict diagnostics mode excepted, and
/// that is opt-in).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The caller-supplied stack buffer is missing or below the minimum.
    #[error("stack too small: {len} bytes (minimum {min})")]
    StackTooSmall { len: usize, min: usize },

    /// The thread handle does not name a thread of this kernel.
    #[error("unknown thread handle {0:?}")]
    UnknownThread(crate::ThreadId),

    /// The queue handle does not name a wait queue of this kernel.
    #[error("unknown wait queue {0:?}")]
    UnknownQueue(crate::WaitQueue),

    /// The calling host thread is not registered with this kernel, so it has
    /// no emulated-thread identity to block or lock with.
    #[error("calling host thread is not a kernel thread")]
    NotAKernelThread,

    /// The mutex handle does not name a mutex of this kernel.
    #[error("unknown mutex {0:?}")]
    UnknownMutex(crate::Mutex),

    /// The condition-variable handle does not name one of this kernel.
    #[error("unknown condition variable {0:?}")]
    UnknownCond(crate::CondVar),

    /// A condition-variable wait requires the caller to hold the mutex.
    #[error("mutex {0:?} is not held by the calling thread")]
    MutexNotOwned(crate::Mutex),

    /// The thread terminated but its stack was already reclaimed by an
    /// earlier join.
    #[error("stack of {0:?} was already reclaimed")]
    StackAlreadyReclaimed(crate::ThreadId),

    /// The host refused to start a backing thread.
    #[error("failed to spawn host thread: {0}")]
    HostSpawn(String),
}
