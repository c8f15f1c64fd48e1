//! Spinlock implementation with configurable guards.

use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::guard::BaseGuard;

/// A non-blocking mutual exclusion lock.
///
/// The guard type `G` decides what else happens while the lock is held, see
/// [`crate::NoOp`] and [`crate::NoPreempt`]. The lock word is always an
/// atomic: tasks run on host threads, so there is no uniprocessor shortcut.
///
/// # Examples
///
/// ```rust,ignore
/// use kspin::SpinNoPreempt;
///
/// let lock = SpinNoPreempt::new(42);
/// {
///     let guard = lock.lock();
///     assert_eq!(*guard, 42);
///     // preemption is disabled here
/// }
/// ```
pub struct SpinLock<G: BaseGuard, T: ?Sized> {
    _phantom: PhantomData<G>,
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

/// RAII guard for [`SpinLock`].
///
/// Gives access to the protected data and releases the lock when dropped.
/// The guard is tied to the task that took it and cannot be sent elsewhere.
pub struct SpinLockGuard<'a, G: BaseGuard, T: ?Sized + 'a> {
    lock: &'a SpinLock<G, T>,
    guard_state: G::State,
    _not_send: PhantomData<*mut ()>,
}

// Same unsafe impls as `std::sync::Mutex`
unsafe impl<G: BaseGuard, T: ?Sized + Send> Sync for SpinLock<G, T> {}
unsafe impl<G: BaseGuard, T: ?Sized + Send> Send for SpinLock<G, T> {}

unsafe impl<G: BaseGuard, T: ?Sized + Sync> Sync for SpinLockGuard<'_, G, T> {}

impl<G: BaseGuard, T> SpinLock<G, T> {
    /// Creates a new unlocked spinlock.
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        Self {
            _phantom: PhantomData,
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Consumes the lock and returns the inner value.
    #[inline(always)]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<G: BaseGuard, T: ?Sized> SpinLock<G, T> {
    /// Acquires the lock, spinning until it is available.
    ///
    /// Spinning on a lock the caller already holds never terminates.
    #[inline(always)]
    pub fn lock(&self) -> SpinLockGuard<'_, G, T> {
        let guard_state = G::acquire();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.is_locked() {
                core::hint::spin_loop();
            }
        }
        SpinLockGuard {
            lock: self,
            guard_state,
            _not_send: PhantomData,
        }
    }

    /// Tries to acquire the lock once.
    ///
    /// Returns `None` if the lock is held; the guard state is restored in
    /// that case.
    #[inline(always)]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, G, T>> {
        let guard_state = G::acquire();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinLockGuard {
                lock: self,
                guard_state,
                _not_send: PhantomData,
            })
        } else {
            G::release(guard_state);
            None
        }
    }

    /// Whether the lock is currently held by anyone.
    ///
    /// The answer may be stale by the time it is used; it is not a
    /// synchronization tool.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Mutable access without locking, proven exclusive by `&mut self`.
    #[inline(always)]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<G: BaseGuard, T: Default> Default for SpinLock<G, T> {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<G: BaseGuard, T: ?Sized + fmt::Debug> fmt::Debug for SpinLock<G, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("data", &&*guard).finish(),
            None => f
                .debug_struct("SpinLock")
                .field("data", &"<locked>")
                .finish(),
        }
    }
}

impl<'a, G: BaseGuard, T: ?Sized> SpinLockGuard<'a, G, T> {
    /// The lock this guard belongs to.
    ///
    /// Sleep queues use it to take the lock again after the guard was given
    /// up across a block.
    #[inline(always)]
    pub fn spinlock(this: &Self) -> &'a SpinLock<G, T> {
        this.lock
    }
}

impl<G: BaseGuard, T: ?Sized> Deref for SpinLockGuard<'_, G, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: the lock word is held for the lifetime of the guard.
        unsafe { &*self.lock.data.get() }
    }
}

impl<G: BaseGuard, T: ?Sized> DerefMut for SpinLockGuard<'_, G, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the lock word is held for the lifetime of the guard.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<G: BaseGuard, T: ?Sized + fmt::Debug> fmt::Debug for SpinLockGuard<'_, G, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<G: BaseGuard, T: ?Sized> Drop for SpinLockGuard<'_, G, T> {
    #[inline(always)]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        G::release(self.guard_state);
    }
}
