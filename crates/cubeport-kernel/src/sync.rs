use crate::error::{KernelError, Result};
use crate::sched::{Kernel, Sched, ThreadState};

/// Handle to a recursive kernel mutex.
///
/// The owner field in the underlying record is a non-owning back-reference
/// to a thread handle; the mutex never manages the thread's lifetime.
/// Invariant: the recursion count is positive iff an owner is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mutex(pub(crate) u32);

/// Handle to a kernel condition variable (an embedded wait queue and
/// nothing else; the associated mutex is supplied per wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CondVar(pub(crate) u32);

/// Releases full ownership of `m`, handing it directly to the head of its
/// wait queue if one exists.
///
/// Direct handoff (rather than wake-and-retry) is what makes mutex grant
/// order strictly FIFO: a thread that keeps running after its unlock cannot
/// barge in ahead of a waiter that was enqueued first.
fn release_to_next(st: &mut Sched, m: Mutex) {
    let queue = st.mutexes.get(&m).expect("mutex record exists").queue;
    let next = st.queues.get_mut(&queue).and_then(|q| q.pop_front());
    let rec = st.mutexes.get_mut(&m).expect("mutex record exists");
    match next {
        Some(id) => {
            rec.owner = Some(id);
            rec.count = 1;
            st.make_ready(id);
        }
        None => {
            rec.owner = None;
            rec.count = 0;
        }
    }
}

impl Kernel {
    pub fn create_mutex(&self) -> Mutex {
        self.shared.lock().alloc_mutex()
    }

    pub fn create_cond(&self) -> CondVar {
        self.shared.lock().alloc_cond()
    }

    /// Acquires `m`, blocking FIFO behind the current owner. Re-locking by
    /// the owner just deepens the recursion count.
    pub fn lock(&self, m: Mutex) -> Result<()> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        let rec = st.mutexes.get_mut(&m).ok_or(KernelError::UnknownMutex(m))?;
        match rec.owner {
            None => {
                rec.owner = Some(me);
                rec.count = 1;
            }
            Some(owner) if owner == me => rec.count += 1,
            Some(_) => {
                let queue = rec.queue;
                st.record_mut(me)?.state = ThreadState::Waiting;
                st.queues
                    .get_mut(&queue)
                    .expect("mutex queue exists")
                    .push_back(me);
                let _st = self.reschedule(st, me);
                // Ownership arrives by direct handoff from the releaser.
                debug_assert_eq!(_st.mutexes[&m].owner, Some(me));
            }
        }
        Ok(())
    }

    /// Releases one level of recursion; at zero the mutex is handed to the
    /// longest-waiting thread.
    ///
    /// Unlock by a thread that is not the owner is a documented silent
    /// no-op, kept for compatibility with client code that relies on it.
    /// The diagnostic hook logs it (and panics in strict mode) because it
    /// almost always masks a caller bug.
    pub fn unlock(&self, m: Mutex) -> Result<()> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        let rec = st.mutexes.get_mut(&m).ok_or(KernelError::UnknownMutex(m))?;
        if rec.owner != Some(me) {
            drop(st);
            self.shared
                .misuse("unlock of a mutex not held by the calling thread");
            return Ok(());
        }
        debug_assert!(rec.count > 0, "owned mutex must have a positive count");
        rec.count -= 1;
        if rec.count == 0 {
            release_to_next(&mut st, m);
        }
        Ok(())
    }

    /// Acquires `m` without blocking. Returns `false` if another thread
    /// holds it.
    pub fn try_lock(&self, m: Mutex) -> Result<bool> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        let rec = st.mutexes.get_mut(&m).ok_or(KernelError::UnknownMutex(m))?;
        match rec.owner {
            None => {
                rec.owner = Some(me);
                rec.count = 1;
                Ok(true)
            }
            Some(owner) if owner == me => {
                rec.count += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Atomically releases `m` and blocks on `cond`, then reacquires `m`
    /// (restoring the full recursion depth) before returning.
    ///
    /// The release, the enqueue on the condition queue and the suspension
    /// all happen inside one scheduler critical section, so there is no
    /// window in which a signal could be missed.
    pub fn wait(&self, cond: CondVar, m: Mutex) -> Result<()> {
        let mut st = self.shared.lock();
        let me = st.current_of_host()?;
        let cond_queue = *st
            .condvars
            .get(&cond)
            .ok_or(KernelError::UnknownCond(cond))?;
        let rec = st.mutexes.get_mut(&m).ok_or(KernelError::UnknownMutex(m))?;
        if rec.owner != Some(me) {
            return Err(KernelError::MutexNotOwned(m));
        }
        let saved_count = rec.count;

        release_to_next(&mut st, m);
        st.record_mut(me)?.state = ThreadState::Waiting;
        st.queues
            .get_mut(&cond_queue)
            .expect("cond queue exists")
            .push_back(me);
        let mut st = self.reschedule(st, me);

        // Signalled: take the mutex back before returning to the caller.
        loop {
            let rec = st.mutexes.get_mut(&m).expect("mutex record exists");
            match rec.owner {
                None => {
                    rec.owner = Some(me);
                    rec.count = saved_count;
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    // Handed off while we were on the mutex queue.
                    rec.count = saved_count;
                    return Ok(());
                }
                Some(_) => {
                    let queue = rec.queue;
                    st.record_mut(me)?.state = ThreadState::Waiting;
                    st.queues
                        .get_mut(&queue)
                        .expect("mutex queue exists")
                        .push_back(me);
                    st = self.reschedule(st, me);
                }
            }
        }
    }

    /// Wakes at most one waiter, FIFO. No broadcast primitive exists.
    pub fn signal(&self, cond: CondVar) -> Result<()> {
        let mut st = self.shared.lock();
        let cond_queue = *st
            .condvars
            .get(&cond)
            .ok_or(KernelError::UnknownCond(cond))?;
        if let Some(id) = st.queues.get_mut(&cond_queue).and_then(|q| q.pop_front()) {
            st.make_ready(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_and_count(kernel: &Kernel, m: Mutex) -> (Option<crate::ThreadId>, u32) {
        let st = kernel.shared.lock();
        let rec = &st.mutexes[&m];
        (rec.owner, rec.count)
    }

    #[test]
    fn lock_recursion_counts_up_and_down() {
        let kernel = Kernel::new();
        let me = kernel.current_thread().unwrap();
        let m = kernel.create_mutex();

        for depth in 1..=5u32 {
            kernel.lock(m).unwrap();
            assert_eq!(owner_and_count(&kernel, m), (Some(me), depth));
        }
        for depth in (0..5u32).rev() {
            kernel.unlock(m).unwrap();
            let expected_owner = if depth > 0 { Some(me) } else { None };
            assert_eq!(owner_and_count(&kernel, m), (expected_owner, depth));
        }
    }

    #[test]
    fn try_lock_by_owner_recurses() {
        let kernel = Kernel::new();
        let m = kernel.create_mutex();
        assert!(kernel.try_lock(m).unwrap());
        assert!(kernel.try_lock(m).unwrap());
        assert_eq!(owner_and_count(&kernel, m).1, 2);
        kernel.unlock(m).unwrap();
        kernel.unlock(m).unwrap();
        assert_eq!(owner_and_count(&kernel, m), (None, 0));
    }

    #[test]
    fn unlock_by_non_owner_is_a_silent_no_op_by_default() {
        let kernel = Kernel::new();
        let m = kernel.create_mutex();
        // Nobody owns the mutex; this must not error and must not change
        // state.
        kernel.unlock(m).unwrap();
        assert_eq!(owner_and_count(&kernel, m), (None, 0));
    }

    #[test]
    #[should_panic(expected = "kernel misuse")]
    fn unlock_by_non_owner_panics_in_strict_mode() {
        let kernel = Kernel::with_strict(true);
        let m = kernel.create_mutex();
        let _ = kernel.unlock(m);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let kernel = Kernel::new();
        let bogus = Mutex(999);
        assert_eq!(
            kernel.lock(bogus).unwrap_err(),
            KernelError::UnknownMutex(bogus)
        );
        assert_eq!(
            kernel.signal(CondVar(999)).unwrap_err(),
            KernelError::UnknownCond(CondVar(999))
        );
    }
}
