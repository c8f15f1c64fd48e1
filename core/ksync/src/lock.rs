//! A blocking lock with an owner.

use alloc::borrow::Cow;

use kerrno::KResult;
use kspin::SpinNoPreempt;
use ktask::{KtaskId, WaitQueue, current, might_sleep};

use crate::util::dup_name;

/// A sleeping mutual-exclusion lock that knows which task holds it.
///
/// When the lock is held, other tasks trying to acquire it block and are put
/// into the wait queue. Releasing the lock wakes up one of them. A task that
/// never slept may still get the lock first; there is no fairness guarantee.
///
/// Only the holder may release the lock, and the holder may not acquire it
/// again. Both mistakes are fatal.
///
/// [`Lock`] is also a [`lock_api::RawMutex`], see [`Mutex`] for the
/// data-carrying form.
pub struct Lock {
    name: Cow<'static, str>,
    holder: SpinNoPreempt<Option<KtaskId>>,
    queue: WaitQueue,
}

impl Lock {
    /// Creates a new unlocked [`Lock`].
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            holder: SpinNoPreempt::new(None),
            queue: WaitQueue::new(),
        }
    }

    /// Creates a new unlocked [`Lock`], copying `name`.
    ///
    /// Fails with `NoMemory` if the name cannot be copied.
    pub fn create(name: &str) -> KResult<Self> {
        let lock = Self {
            name: dup_name(name)?,
            ..Self::new("")
        };
        trace!("lock {} created", lock.name);
        Ok(lock)
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the lock, blocking while another task holds it.
    ///
    /// # Panics
    ///
    /// Panics if the current task already holds the lock or may not sleep.
    /// With the `watchdog` feature, also panics instead of blocking when the
    /// wait would never end.
    pub fn acquire(&self) {
        let curr = current();
        might_sleep();
        let mut holder = self.holder.lock();
        while let Some(owner) = *holder {
            assert_ne!(
                owner,
                curr.id(),
                "{} tried to acquire lock {} it already owns.",
                curr.id_name(),
                self.name
            );
            #[cfg(feature = "watchdog")]
            if let Err(cycle) = ktask::watchdog::wait(self.addr()) {
                drop(holder);
                panic!(
                    "{} deadlock detected on lock {}: {}",
                    curr.id_name(),
                    self.name,
                    cycle
                );
            }
            holder = self.queue.wait(holder);
        }
        *holder = Some(curr.id());
        #[cfg(feature = "watchdog")]
        ktask::watchdog::acquired(self.addr());
    }

    /// Tries to acquire the lock without blocking.
    ///
    /// Returns `true` if the lock was acquired.
    pub fn try_acquire(&self) -> bool {
        let mut holder = self.holder.lock();
        if holder.is_some() {
            return false;
        }
        *holder = Some(current().id());
        #[cfg(feature = "watchdog")]
        ktask::watchdog::acquired(self.addr());
        true
    }

    /// Releases the lock and wakes up one blocked task, if any.
    ///
    /// # Panics
    ///
    /// Panics if the current task does not hold the lock.
    pub fn release(&self) {
        let mut holder = self.holder.lock();
        let curr = current();
        assert_eq!(
            *holder,
            Some(curr.id()),
            "{} tried to release lock {} it doesn't own",
            curr.id_name(),
            self.name
        );
        *holder = None;
        #[cfg(feature = "watchdog")]
        ktask::watchdog::released(self.addr());
        self.queue.notify_one();
    }

    /// Whether the current task holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        *self.holder.lock() == Some(current().id())
    }

    /// Whether any task holds the lock.
    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Destroys the lock.
    ///
    /// # Panics
    ///
    /// Panics if the lock is still held.
    pub fn destroy(self) {
        self.retire();
    }

    fn retire(&self) {
        if let Some(owner) = *self.holder.lock() {
            panic!("lock {} destroyed while held by task {}", self.name, owner);
        }
        trace!("lock {} destroyed", self.name);
    }

    #[cfg(feature = "watchdog")]
    fn addr(&self) -> usize {
        self as *const _ as usize
    }
}

unsafe impl lock_api::RawMutex for Lock {
    type GuardMarker = lock_api::GuardNoSend;

    /// Initial value for an unlocked mutex.
    ///
    /// A “non-constant” const item is a legacy way to supply an initialized
    /// value to downstream static items. Can hopefully be replaced with
    /// `const fn new() -> Self` at some point.
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Lock::new("mutex");

    #[inline(always)]
    fn lock(&self) {
        self.acquire();
    }

    #[inline(always)]
    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    #[inline(always)]
    unsafe fn unlock(&self) {
        self.release();
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        Lock::is_locked(self)
    }
}

/// An alias of [`lock_api::Mutex`].
pub type Mutex<T> = lock_api::Mutex<Lock, T>;
/// An alias of [`lock_api::MutexGuard`].
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, Lock, T>;

/// Destroys a [`Mutex`] the way [`Lock::destroy`] does and returns its data.
///
/// # Panics
///
/// Panics if the mutex is still locked.
pub fn destroy_mutex<T>(mutex: Mutex<T>) -> T {
    // SAFETY: the raw lock is only inspected, never unlocked.
    unsafe { mutex.raw() }.retire();
    mutex.into_inner()
}

#[cfg(test)]
mod tests {
    use std::sync::Once;

    use ktask as thread;

    use crate::{Lock, Mutex, destroy_mutex};

    static INIT: Once = Once::new();

    #[test]
    fn holder_is_tracked() {
        INIT.call_once(thread::init_scheduler);

        let lock = Lock::new("tracked");
        assert!(!lock.is_locked());
        lock.acquire();
        assert!(lock.is_locked());
        assert!(lock.is_held_by_current());
        let seen = std::thread::scope(|s| {
            s.spawn(|| (lock.is_held_by_current(), lock.try_acquire()))
                .join()
                .unwrap()
        });
        assert_eq!(seen, (false, false));
        lock.release();
        assert!(!lock.is_held_by_current());
        lock.destroy();
    }

    #[test]
    fn destroy_mutex_hands_back_data() {
        INIT.call_once(thread::init_scheduler);

        let m = Mutex::const_new(Lock::new("data"), vec![1, 2]);
        m.lock().push(3);
        assert_eq!(destroy_mutex(m), [1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "lock leaked destroyed while held")]
    fn destroy_locked_mutex_is_fatal() {
        INIT.call_once(thread::init_scheduler);

        let m = Mutex::const_new(Lock::new("leaked"), 0u32);
        core::mem::forget(m.lock());
        destroy_mutex(m);
    }

    #[test]
    #[should_panic(expected = "already owns")]
    fn relock_is_fatal() {
        INIT.call_once(thread::init_scheduler);

        let lock = Lock::new("relock");
        lock.acquire();
        lock.acquire();
    }
}
