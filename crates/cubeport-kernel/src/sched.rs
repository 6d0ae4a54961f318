use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar as HostCondvar, Mutex as HostMutex, MutexGuard};

use crate::error::{KernelError, Result};

/// Minimum caller-supplied stack size accepted by [`Kernel::spawn`].
pub const MIN_STACK_SIZE: usize = 4096;

/// Handle to an emulated thread. Never reused within a kernel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub(crate) u32);

/// Handle to a FIFO wait queue owned by the scheduler.
///
/// Queues are shared structurally: the same queue type backs raw
/// sleep/wake, mutex contention and condition variables. A thread sits in
/// at most one queue at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitQueue(pub(crate) u32);

/// Lifecycle states of an emulated thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Waiting,
    Sleeping,
    Terminated,
}

pub(crate) struct ThreadRecord {
    pub(crate) priority: u32,
    pub(crate) state: ThreadState,
    /// In the run queue (Ready and schedulable).
    pub(crate) scheduled: bool,
    /// Caller-supplied stack buffer; returned to the creator by `join`.
    pub(crate) stack: Option<Vec<u8>>,
    /// Threads blocked in `join` on this thread.
    pub(crate) join_queue: WaitQueue,
    /// Wakes the backing host thread once this thread is dispatched.
    pub(crate) unpark: Arc<HostCondvar>,
}

pub(crate) struct MutexRecord {
    pub(crate) owner: Option<ThreadId>,
    pub(crate) count: u32,
    pub(crate) queue: WaitQueue,
}

/// All scheduler state lives behind one host mutex so every observable
/// transition (enqueue, state change, dispatch) is a single critical
/// section; in particular a condition wait can release its mutex and
/// enqueue without any window for a missed signal.
pub(crate) struct Sched {
    pub(crate) threads: HashMap<ThreadId, ThreadRecord>,
    pub(crate) queues: HashMap<WaitQueue, VecDeque<ThreadId>>,
    pub(crate) mutexes: HashMap<crate::Mutex, MutexRecord>,
    pub(crate) condvars: HashMap<crate::CondVar, WaitQueue>,
    pub(crate) run_queue: VecDeque<ThreadId>,
    pub(crate) current: Option<ThreadId>,
    /// Host-thread identity of each emulated thread, so kernel calls can
    /// find "the calling thread" without hidden thread-locals.
    pub(crate) host: HashMap<std::thread::ThreadId, ThreadId>,
    next_thread: u32,
    next_queue: u32,
    next_mutex: u32,
    next_cond: u32,
}

impl Sched {
    fn alloc_queue(&mut self) -> WaitQueue {
        let q = WaitQueue(self.next_queue);
        self.next_queue += 1;
        self.queues.insert(q, VecDeque::new());
        q
    }

    pub(crate) fn alloc_mutex(&mut self) -> crate::Mutex {
        let queue = self.alloc_queue();
        let m = crate::Mutex(self.next_mutex);
        self.next_mutex += 1;
        self.mutexes.insert(
            m,
            MutexRecord {
                owner: None,
                count: 0,
                queue,
            },
        );
        m
    }

    pub(crate) fn alloc_cond(&mut self) -> crate::CondVar {
        let queue = self.alloc_queue();
        let c = crate::CondVar(self.next_cond);
        self.next_cond += 1;
        self.condvars.insert(c, queue);
        c
    }

    pub(crate) fn current_of_host(&self) -> Result<ThreadId> {
        self.host
            .get(&std::thread::current().id())
            .copied()
            .ok_or(KernelError::NotAKernelThread)
    }

    pub(crate) fn record(&self, id: ThreadId) -> Result<&ThreadRecord> {
        self.threads.get(&id).ok_or(KernelError::UnknownThread(id))
    }

    pub(crate) fn record_mut(&mut self, id: ThreadId) -> Result<&mut ThreadRecord> {
        self.threads
            .get_mut(&id)
            .ok_or(KernelError::UnknownThread(id))
    }

    /// Moves `id` to the back of the run queue if it is not already there.
    ///
    /// When the machine is idle (every thread blocked, `current` is `None`)
    /// there is no running thread left to reach a yield point, so the wake
    /// itself must dispatch; this is how a wake arriving from a foreign host
    /// thread restarts an otherwise fully parked scheduler.
    pub(crate) fn make_ready(&mut self, id: ThreadId) {
        let rec = self.threads.get_mut(&id).expect("thread record exists");
        rec.state = ThreadState::Ready;
        if !rec.scheduled {
            rec.scheduled = true;
            self.run_queue.push_back(id);
        }
        if self.current.is_none() {
            self.dispatch_next();
        }
    }

    /// Hands the CPU to the next runnable thread, if any.
    ///
    /// With an empty run queue `current` becomes `None`: the machine is idle
    /// until something wakes a sleeper, exactly like the console hanging on
    /// a lost wakeup. Cooperative scheduling makes that the client's bug to
    /// avoid, not ours to paper over.
    pub(crate) fn dispatch_next(&mut self) {
        match self.run_queue.pop_front() {
            Some(next) => {
                let rec = self.threads.get_mut(&next).expect("thread record exists");
                rec.scheduled = false;
                rec.state = ThreadState::Running;
                self.current = Some(next);
                rec.unpark.notify_one();
                tracing::trace!(thread = next.0, "dispatch");
            }
            None => self.current = None,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) state: HostMutex<Sched>,
    pub(crate) strict: bool,
}

impl Shared {
    /// Poison-tolerant lock: a panic inside a client entry function must not
    /// take the whole scheduler down with it.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Sched> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Diagnostic hook for the documented misuse no-ops. Default mode keeps
    /// the original observable behavior and only logs; strict mode turns the
    /// misuse into a panic.
    pub(crate) fn misuse(&self, what: &str) {
        tracing::warn!("{what}");
        if self.strict {
            panic!("kernel misuse: {what}");
        }
    }
}

/// Cooperative thread kernel for one emulation session.
///
/// Emulated threads are backed by host threads, but the scheduler permits
/// exactly one of them past any suspension point at a time, so client code
/// observes run-to-completion semantics between its own blocking calls.
/// Wake order within any wait queue is strictly FIFO by enqueue time;
/// priority is carried on the handle but never reorders wakeups.
///
/// The constructor adopts the calling host thread as the initial running
/// thread (the "boot" thread), mirroring how the original library turns the
/// caller of its init routine into a schedulable thread.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) shared: Arc<Shared>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_strict(false)
    }

    /// Like [`Kernel::new`], with opt-in strict diagnostics: the documented
    /// misuse no-ops (unlock by a non-owner, wake on an unknown queue
    /// handle) panic instead of merely logging.
    pub fn with_strict(strict: bool) -> Self {
        let mut sched = Sched {
            threads: HashMap::new(),
            queues: HashMap::new(),
            mutexes: HashMap::new(),
            condvars: HashMap::new(),
            run_queue: VecDeque::new(),
            current: None,
            host: HashMap::new(),
            next_thread: 0,
            next_queue: 0,
            next_mutex: 0,
            next_cond: 0,
        };

        // Adopt the caller as the boot thread.
        let join_queue = sched.alloc_queue();
        let boot = ThreadId(sched.next_thread);
        sched.next_thread += 1;
        sched.threads.insert(
            boot,
            ThreadRecord {
                priority: 16,
                state: ThreadState::Running,
                scheduled: false,
                stack: None,
                join_queue,
                unpark: Arc::new(HostCondvar::new()),
            },
        );
        sched.current = Some(boot);
        sched.host.insert(std::thread::current().id(), boot);

        Self {
            shared: Arc::new(Shared {
                state: HostMutex::new(sched),
                strict,
            }),
        }
    }

    /// Creates a thread in the `Ready` state. It does not run until
    /// [`resume`](Self::resume)d, and then only once the running thread
    /// yields or blocks.
    ///
    /// The stack buffer is owned by the handle for the thread's lifetime and
    /// handed back to the creator by [`join`](Self::join). The backing host
    /// thread uses its own native stack; the buffer exists to reproduce the
    /// original API's ownership discipline.
    pub fn spawn<F>(&self, entry: F, stack: Vec<u8>, priority: u32) -> Result<ThreadId>
    where
        F: FnOnce(&Kernel) + Send + 'static,
    {
        if stack.len() < MIN_STACK_SIZE {
            return Err(KernelError::StackTooSmall {
                len: stack.len(),
                min: MIN_STACK_SIZE,
            });
        }

        let id;
        let unpark = Arc::new(HostCondvar::new());
        {
            let mut st = self.shared.lock();
            id = ThreadId(st.next_thread);
            st.next_thread += 1;
            let join_queue = st.alloc_queue();
            st.threads.insert(
                id,
                ThreadRecord {
                    priority,
                    state: ThreadState::Ready,
                    scheduled: false,
                    stack: Some(stack),
                    join_queue,
                    unpark: unpark.clone(),
                },
            );
        }

        let kernel = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("cubeport-thread-{}", id.0))
            .spawn(move || kernel.run_thread(id, entry));
        if let Err(e) = spawned {
            let mut st = self.shared.lock();
            if let Some(rec) = st.threads.remove(&id) {
                st.queues.remove(&rec.join_queue);
            }
            return Err(KernelError::HostSpawn(e.to_string()));
        }
        Ok(id)
    }

    fn run_thread<F>(&self, id: ThreadId, entry: F)
    where
        F: FnOnce(&Kernel),
    {
        {
            let mut st = self.shared.lock();
            st.host.insert(std::thread::current().id(), id);
            st = self.wait_until_running(st, id);
            drop(st);
        }

        entry(self);

        // Entry returned: terminate, release joiners and hand the CPU on.
        let mut st = self.shared.lock();
        st.host.remove(&std::thread::current().id());
        let join_queue = st.threads[&id].join_queue;
        if let Some(rec) = st.threads.get_mut(&id) {
            rec.state = ThreadState::Terminated;
        }
        while let Some(waiter) = st
            .queues
            .get_mut(&join_queue)
            .and_then(|q| q.pop_front())
        {
            st.make_ready(waiter);
        }
        st.dispatch_next();
    }

    /// Parks the backing host thread until the scheduler dispatches `me`.
    pub(crate) fn wait_until_running<'a>(
        &'a self,
        mut st: MutexGuard<'a, Sched>,
        me: ThreadId,
    ) -> MutexGuard<'a, Sched> {
        let unpark = st.threads[&me].unpark.clone();
        while st.threads[&me].state != ThreadState::Running {
            st = unpark.wait(st).unwrap_or_else(|e| e.into_inner());
        }
        st
    }

    /// Hands the CPU to the next runnable thread and blocks until `me` is
    /// rescheduled. Callers must have already placed `me` on whatever queue
    /// will eventually wake it (a wait queue, or the run queue for a plain
    /// yield).
    pub(crate) fn reschedule<'a>(
        &'a self,
        mut st: MutexGuard<'a, Sched>,
        me: ThreadId,
    ) -> MutexGuard<'a, Sched> {
        st.dispatch_next();
        self.wait_until_running(st, me)
    }

    /// Makes a `Ready` thread schedulable. Idempotent if it already is; a
    /// blocked, running or terminated thread is left alone.
    pub fn resume(&self, id: ThreadId) -> Result<()> {
        let mut st = self.shared.lock();
        match st.record(id)?.state {
            ThreadState::Ready => {
                st.make_ready(id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Creates a wait queue for use with [`sleep_on`](Self::sleep_on) /
    /// [`wake_one`](Self::wake_one).
    pub fn new_wait_queue(&self) -> WaitQueue {
        self.shared.lock().alloc_queue()
    }

    /// Blocks the calling thread on `queue` until a matching
    /// [`wake_one`](Self::wake_one). No timeout: an unmatched sleep blocks
    /// forever.
    pub fn sleep_on(&self, queue: WaitQueue) -> Result<()> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        if !st.queues.contains_key(&queue) {
            return Err(KernelError::UnknownQueue(queue));
        }
        st.record_mut(me)?.state = ThreadState::Sleeping;
        st.queues
            .get_mut(&queue)
            .expect("checked above")
            .push_back(me);
        let _st = self.reschedule(st, me);
        Ok(())
    }

    /// Wakes the head of `queue` (strict FIFO; stored priority is
    /// deliberately ignored). Waking an empty queue is a no-op; a handle
    /// that belongs to no queue of this kernel (e.g. one from another
    /// instance) is a misuse no-op that fires the diagnostic hook.
    pub fn wake_one(&self, queue: WaitQueue) {
        let mut st = self.shared.lock();
        match st.queues.get_mut(&queue) {
            Some(q) => match q.pop_front() {
                Some(id) => st.make_ready(id),
                None => tracing::trace!(queue = queue.0, "wakeup on empty queue"),
            },
            None => {
                drop(st);
                self.shared.misuse("wakeup on an unknown wait queue");
            }
        }
    }

    /// Voluntary reschedule point: moves the caller to the back of the run
    /// queue and dispatches the head. With nothing else runnable the caller
    /// just keeps going.
    pub fn yield_now(&self) -> Result<()> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        if st.run_queue.is_empty() {
            return Ok(());
        }
        st.make_ready(me);
        let _st = self.reschedule(st, me);
        Ok(())
    }

    /// Observes the `Terminated` state without blocking.
    pub fn is_terminated(&self, id: ThreadId) -> Result<bool> {
        let st = self.shared.lock();
        Ok(st.record(id)?.state == ThreadState::Terminated)
    }

    pub fn state_of(&self, id: ThreadId) -> Result<ThreadState> {
        let st = self.shared.lock();
        Ok(st.record(id)?.state)
    }

    pub fn priority_of(&self, id: ThreadId) -> Result<u32> {
        let st = self.shared.lock();
        Ok(st.record(id)?.priority)
    }

    /// Blocks until `id` terminates and returns its stack buffer to the
    /// caller. A second join on the same thread fails with
    /// [`KernelError::StackAlreadyReclaimed`].
    pub fn join(&self, id: ThreadId) -> Result<Vec<u8>> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        while st.record(id)?.state != ThreadState::Terminated {
            let join_queue = st.record(id)?.join_queue;
            st.record_mut(me)?.state = ThreadState::Waiting;
            st.queues
                .get_mut(&join_queue)
                .expect("join queue exists")
                .push_back(me);
            st = self.reschedule(st, me);
        }
        st.record_mut(id)?
            .stack
            .take()
            .ok_or(KernelError::StackAlreadyReclaimed(id))
    }

    /// Identity of the calling emulated thread.
    pub fn current_thread(&self) -> Result<ThreadId> {
        self.shared.lock().current_of_host()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
