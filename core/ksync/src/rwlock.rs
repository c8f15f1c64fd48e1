//! A reader-writer lock implementation.

use alloc::borrow::Cow;

use fastrand::Rng;
use kerrno::KResult;
use kspin::SpinNoPreempt;
use ktask::{KtaskId, WaitQueue, current, might_sleep};

use crate::util::dup_name;

/// Decides whether waiting writers should overtake new readers.
///
/// Consulted each time a reader leaves while others still read and a writer
/// is waiting. Returning `true` holds back readers that have not entered yet
/// until a writer has had its turn.
///
/// Closures of type `Fn(usize) -> bool` are policies too, which makes it easy
/// to inject a fixed decision sequence.
pub trait WriterPolicy: Sync {
    /// `readers` is the number of readers still inside.
    fn should_prioritize_writer(&self, readers: usize) -> bool;
}

impl<F: Fn(usize) -> bool + Sync> WriterPolicy for F {
    fn should_prioritize_writer(&self, readers: usize) -> bool {
        self(readers)
    }
}

/// The default [`WriterPolicy`]: a fair coin flip per reader release.
pub struct CoinFlip;

impl WriterPolicy for CoinFlip {
    fn should_prioritize_writer(&self, _readers: usize) -> bool {
        static RNG: SpinNoPreempt<Option<Rng>> = SpinNoPreempt::new(None);
        let mut rng = RNG.lock();
        rng.get_or_insert_with(|| Rng::with_seed(current().id().as_u64()))
            .bool()
    }
}

struct RwState {
    readers: usize,
    writer: Option<KtaskId>,
    writers_pending: usize,
    writer_priority: bool,
}

/// A sleeping reader-writer lock.
///
/// Allows multiple readers or a single writer. Readers block while a writer
/// is active or has been given priority; writers block while anybody holds
/// the lock. Every release wakes all blocked tasks, which then re-check their
/// own condition.
///
/// Writer starvation is mitigated, not prevented: when a reader leaves with
/// others still inside and a writer waiting, the [`WriterPolicy`] may give
/// writers priority, closing the door on new readers until the next write
/// release.
pub struct RwLock {
    name: Cow<'static, str>,
    state: SpinNoPreempt<RwState>,
    queue: WaitQueue,
    policy: &'static dyn WriterPolicy,
}

impl RwLock {
    /// Creates a new [`RwLock`] with the [`CoinFlip`] policy.
    pub const fn new(name: &'static str) -> Self {
        Self::with_policy(name, &CoinFlip)
    }

    /// Creates a new [`RwLock`] with the given writer policy.
    pub const fn with_policy(name: &'static str, policy: &'static dyn WriterPolicy) -> Self {
        Self {
            name: Cow::Borrowed(name),
            state: SpinNoPreempt::new(RwState {
                readers: 0,
                writer: None,
                writers_pending: 0,
                writer_priority: false,
            }),
            queue: WaitQueue::new(),
            policy,
        }
    }

    /// Creates a new [`RwLock`] with the [`CoinFlip`] policy, copying `name`.
    ///
    /// Fails with `NoMemory` if the name cannot be copied.
    pub fn create(name: &str) -> KResult<Self> {
        let rw = Self {
            name: dup_name(name)?,
            ..Self::new("")
        };
        trace!("rwlock {} created", rw.name);
        Ok(rw)
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires a read lock, blocking while a writer is active or has
    /// priority.
    pub fn acquire_read(&self) {
        might_sleep();
        let mut state = self.state.lock();
        while state.writer.is_some() || state.writer_priority {
            state = self.queue.wait(state);
        }
        state.readers += 1;
    }

    /// Tries to acquire a read lock without blocking.
    pub fn try_acquire_read(&self) -> bool {
        let mut state = self.state.lock();
        if state.writer.is_some() || state.writer_priority {
            return false;
        }
        state.readers += 1;
        true
    }

    /// Releases a read lock.
    ///
    /// # Panics
    ///
    /// Panics if no read lock is held.
    pub fn release_read(&self) {
        let mut state = self.state.lock();
        assert!(
            state.readers > 0,
            "{} released read lock {} that no one holds",
            current().id_name(),
            self.name
        );
        state.readers -= 1;
        if state.readers > 0
            && state.writers_pending > 0
            && self.policy.should_prioritize_writer(state.readers)
        {
            state.writer_priority = true;
        }
        self.queue.notify_all();
    }

    /// Acquires the write lock, blocking while a writer is active or readers
    /// are inside.
    pub fn acquire_write(&self) {
        let curr = current();
        might_sleep();
        let mut state = self.state.lock();
        state.writers_pending += 1;
        while state.writer.is_some() || state.readers > 0 {
            state = self.queue.wait(state);
        }
        state.writers_pending -= 1;
        state.writer = Some(curr.id());
    }

    /// Tries to acquire the write lock without blocking.
    pub fn try_acquire_write(&self) -> bool {
        let mut state = self.state.lock();
        if state.writer.is_some() || state.readers > 0 {
            return false;
        }
        state.writer = Some(current().id());
        true
    }

    /// Releases the write lock and clears writer priority.
    ///
    /// # Panics
    ///
    /// Panics if the current task is not the writer.
    pub fn release_write(&self) {
        let mut state = self.state.lock();
        let curr = current();
        assert_eq!(
            state.writer,
            Some(curr.id()),
            "{} tried to release write lock {} it doesn't own",
            curr.id_name(),
            self.name
        );
        state.writer = None;
        state.writer_priority = false;
        self.queue.notify_all();
    }

    /// Number of readers inside.
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Whether a writer is inside.
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Destroys the lock.
    ///
    /// # Panics
    ///
    /// Panics if a reader or a writer is still inside.
    pub fn destroy(self) {
        let state = self.state.lock();
        assert!(
            state.readers == 0 && state.writer.is_none(),
            "rwlock {} destroyed while held ({} readers, writer {:?})",
            self.name,
            state.readers,
            state.writer
        );
        trace!("rwlock {} destroyed", self.name);
    }
}

unsafe impl lock_api::RawRwLock for RwLock {
    type GuardMarker = lock_api::GuardNoSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RwLock::new("rwcell");

    #[inline]
    fn lock_shared(&self) {
        self.acquire_read();
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_acquire_read()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        self.release_read();
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.acquire_write();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_acquire_write()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        self.release_write();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.readers > 0 || state.writer.is_some()
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        self.is_write_locked()
    }
}

/// A reader-writer lock protecting data.
pub type RwCell<T> = lock_api::RwLock<RwLock, T>;
/// A read guard for a [`RwCell`].
pub type RwCellReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RwLock, T>;
/// A write guard for a [`RwCell`].
pub type RwCellWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RwLock, T>;
