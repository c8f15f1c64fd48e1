//! Sleep queues.

use event_listener::{Event, IntoNotification, listener};
use kspin::{BaseGuard, SpinLockGuard};

use crate::{future::block_on, might_sleep};

/// A queue of blocked tasks, sometimes called a sleep channel.
///
/// The queue has no lock of its own. Callers guard the condition they sleep
/// on with a spinlock and hand the guard to [`WaitQueue::wait`]; wakers take
/// the same spinlock before changing the condition and calling
/// [`notify_one`] or [`notify_all`]. Registration happens before the guard is
/// given up, so such a wakeup cannot be missed.
///
/// Wakeup order is queue order, but a woken task still has to re-take the
/// spinlock and may be overtaken by a task that never slept.
///
/// [`notify_one`]: WaitQueue::notify_one
/// [`notify_all`]: WaitQueue::notify_all
pub struct WaitQueue {
    event: Event,
}

impl WaitQueue {
    /// Creates an empty wait queue.
    pub const fn new() -> Self {
        Self {
            event: Event::new(),
        }
    }

    /// Blocks the current task until notified.
    ///
    /// `guard` is released once the task is queued and the spinlock is taken
    /// again before returning. The caller must re-check its condition.
    ///
    /// # Panics
    ///
    /// Panics if the task may not sleep (see [`might_sleep`]), for instance
    /// because it holds another `SpinNoPreempt` lock.
    pub fn wait<'a, G: BaseGuard, T: ?Sized>(
        &self,
        guard: SpinLockGuard<'a, G, T>,
    ) -> SpinLockGuard<'a, G, T> {
        let lock = SpinLockGuard::spinlock(&guard);
        listener!(self.event => listener);
        drop(guard);
        might_sleep();
        block_on(listener);
        lock.lock()
    }

    /// Wakes up one blocked task, if any.
    ///
    /// Tasks already notified but not yet running are not counted, so two
    /// back-to-back calls wake two tasks. Returns whether a task was woken.
    pub fn notify_one(&self) -> bool {
        self.event.notify(1.additional()) > 0
    }

    /// Wakes up all blocked tasks, returning how many were woken.
    pub fn notify_all(&self) -> usize {
        self.event.notify(usize::MAX)
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
