//! A counting semaphore implementation.

use alloc::borrow::Cow;

use kerrno::KResult;
use kspin::SpinNoPreempt;
use ktask::{WaitQueue, current, might_sleep};

use crate::util::dup_name;

struct SemState {
    count: usize,
    waiters: usize,
}

/// A counting semaphore.
///
/// [`acquire`](Semaphore::acquire) blocks while no permit is left;
/// [`release`](Semaphore::release) returns one and wakes one blocked task.
///
/// Wakeups follow queue order, but a released permit is not handed to the
/// woken task: a task that arrives in between may take it first, in which
/// case the woken task goes back to sleep.
pub struct Semaphore {
    name: Cow<'static, str>,
    state: SpinNoPreempt<SemState>,
    queue: WaitQueue,
}

impl Semaphore {
    /// Creates a new semaphore with the given number of permits.
    pub const fn new(name: &'static str, permits: usize) -> Self {
        Self {
            name: Cow::Borrowed(name),
            state: SpinNoPreempt::new(SemState {
                count: permits,
                waiters: 0,
            }),
            queue: WaitQueue::new(),
        }
    }

    /// Creates a new semaphore, copying `name`.
    ///
    /// Fails with `NoMemory` if the name cannot be copied.
    pub fn create(name: &str, permits: usize) -> KResult<Self> {
        let sem = Self {
            name: dup_name(name)?,
            ..Self::new("", permits)
        };
        trace!("semaphore {} created with {} permits", sem.name, permits);
        Ok(sem)
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires a permit, blocking until one is available.
    ///
    /// # Panics
    ///
    /// Panics if the current task may not sleep, even when a permit is
    /// available.
    pub fn acquire(&self) {
        might_sleep();
        let mut state = self.state.lock();
        while state.count == 0 {
            state.waiters += 1;
            state = self.queue.wait(state);
            state.waiters -= 1;
        }
        state.count -= 1;
    }

    /// Tries to acquire a permit without blocking.
    ///
    /// Returns `true` if a permit was acquired, `false` otherwise.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.count == 0 {
            return false;
        }
        state.count -= 1;
        true
    }

    /// Releases a permit and wakes up one blocked task, if any.
    ///
    /// Releasing more permits than the semaphore was created with is
    /// allowed. Callers are responsible for balancing acquire and release.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.count = state.count.checked_add(1).unwrap_or_else(|| {
            panic!(
                "{} overflowed the permits of semaphore {}",
                current().id_name(),
                self.name
            )
        });
        if state.waiters > 0 {
            self.queue.notify_one();
        }
    }

    /// Returns the current number of available permits.
    pub fn available_permits(&self) -> usize {
        self.state.lock().count
    }

    /// Acquires a permit and returns a guard.
    ///
    /// The permit is automatically released when the guard is dropped.
    pub fn acquire_guard(&self) -> SemaphoreGuard<'_> {
        self.acquire();
        SemaphoreGuard { sem: self }
    }

    /// Destroys the semaphore.
    ///
    /// # Panics
    ///
    /// Panics if a task is still blocked on it.
    pub fn destroy(self) {
        let state = self.state.lock();
        assert_eq!(
            state.waiters, 0,
            "semaphore {} destroyed with blocked tasks",
            self.name
        );
        trace!("semaphore {} destroyed", self.name);
    }
}

/// RAII guard for a semaphore permit.
///
/// The permit is automatically released when the guard is dropped.
pub struct SemaphoreGuard<'a> {
    sem: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}
