//! Condition variables bound to a [`Lock`].

use alloc::borrow::Cow;

use kerrno::KResult;
use kspin::SpinNoPreempt;
use ktask::{WaitQueue, current, might_sleep};
use lock_api::MutexGuard as RawMutexGuard;

use crate::{Lock, MutexGuard, util::dup_name};

/// A condition variable.
///
/// A condition variable lets a task sleep until some state guarded by a
/// [`Lock`] changes. Every operation takes the lock and requires the caller
/// to hold it. Nothing ties a condition variable to one particular lock, so
/// using it with several locks is the caller's mistake to avoid.
///
/// A task returning from [`wait`](Condvar::wait) holds the lock again, but
/// others may have taken it in between: the awaited condition must be
/// re-checked in a loop, or [`wait_while`](Condvar::wait_while) used.
/// [`signal`](Condvar::signal) and [`broadcast`](Condvar::broadcast) are not
/// buffered; with nobody waiting they do nothing.
pub struct Condvar {
    name: Cow<'static, str>,
    waiters: SpinNoPreempt<usize>,
    queue: WaitQueue,
}

impl Condvar {
    /// Creates a new condition variable.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            waiters: SpinNoPreempt::new(0),
            queue: WaitQueue::new(),
        }
    }

    /// Creates a new condition variable, copying `name`.
    ///
    /// Fails with `NoMemory` if the name cannot be copied.
    pub fn create(name: &str) -> KResult<Self> {
        let cv = Self {
            name: dup_name(name)?,
            ..Self::new("")
        };
        trace!("condvar {} created", cv.name);
        Ok(cv)
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[track_caller]
    fn check_holding(&self, lock: &Lock, op: &str) {
        assert!(
            lock.is_held_by_current(),
            "{} tried to {} condvar {} while not holding lock {}",
            current().id_name(),
            op,
            self.name,
            lock.name()
        );
    }

    /// Releases `lock`, sleeps until signalled, then acquires `lock` again.
    ///
    /// The task is queued before `lock` is released, so a signal sent by the
    /// next holder of `lock` cannot be missed.
    ///
    /// # Panics
    ///
    /// Panics if the current task does not hold `lock` or may not sleep.
    pub fn wait(&self, lock: &Lock) {
        self.check_holding(lock, "wait on");
        might_sleep();
        let mut waiters = self.waiters.lock();
        *waiters += 1;
        lock.release();
        waiters = self.queue.wait(waiters);
        *waiters -= 1;
        drop(waiters);
        lock.acquire();
    }

    /// Wakes up one task waiting on this condvar, if any.
    ///
    /// # Panics
    ///
    /// Panics if the current task does not hold `lock`.
    pub fn signal(&self, lock: &Lock) {
        self.check_holding(lock, "signal");
        let _waiters = self.waiters.lock();
        self.queue.notify_one();
    }

    /// Wakes up all tasks waiting on this condvar.
    ///
    /// # Panics
    ///
    /// Panics if the current task does not hold `lock`.
    pub fn broadcast(&self, lock: &Lock) {
        self.check_holding(lock, "broadcast");
        let _waiters = self.waiters.lock();
        self.queue.notify_all();
    }

    /// [`wait`](Condvar::wait) for the [`Lock`] behind a [`MutexGuard`].
    ///
    /// The guard stays valid; the data may have changed when this returns.
    pub fn wait_guard<T: ?Sized>(&self, guard: &mut MutexGuard<'_, T>) {
        self.wait(raw_lock(guard));
    }

    /// Blocks while `condition` returns `true`, re-checking it after each
    /// wakeup.
    ///
    /// ```no_run
    /// use ksync::{Condvar, Lock, Mutex};
    ///
    /// static QUEUE: Mutex<Vec<u32>> = Mutex::const_new(Lock::new("queue"), Vec::new());
    /// static NOT_EMPTY: Condvar = Condvar::new("not_empty");
    ///
    /// let mut queue = QUEUE.lock();
    /// NOT_EMPTY.wait_while(&mut queue, |q| q.is_empty());
    /// let item = queue.pop();
    /// ```
    pub fn wait_while<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        mut condition: impl FnMut(&mut T) -> bool,
    ) {
        while condition(&mut **guard) {
            self.wait_guard(guard);
        }
    }

    /// [`signal`](Condvar::signal) for the [`Lock`] behind a [`MutexGuard`].
    pub fn signal_guard<T: ?Sized>(&self, guard: &MutexGuard<'_, T>) {
        self.signal(raw_lock(guard));
    }

    /// [`broadcast`](Condvar::broadcast) for the [`Lock`] behind a
    /// [`MutexGuard`].
    pub fn broadcast_guard<T: ?Sized>(&self, guard: &MutexGuard<'_, T>) {
        self.broadcast(raw_lock(guard));
    }

    /// Destroys the condition variable.
    ///
    /// # Panics
    ///
    /// Panics if a task is still waiting on it.
    pub fn destroy(self) {
        let waiters = *self.waiters.lock();
        assert_eq!(
            waiters, 0,
            "condvar {} destroyed with waiting tasks",
            self.name
        );
        trace!("condvar {} destroyed", self.name);
    }
}

fn raw_lock<'a, T: ?Sized>(guard: &'a MutexGuard<'_, T>) -> &'a Lock {
    // SAFETY: the guard proves the lock is held by the current task, and
    // every use of the raw lock here leaves it held again on return.
    unsafe { RawMutexGuard::mutex(guard).raw() }
}
