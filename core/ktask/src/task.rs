//! Task identity and creation.

use std::{
    cell::RefCell,
    fmt,
    panic,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use crate::TASK_STACK_SIZE;

/// A unique identifier for a task.
///
/// Identifiers are never reused and never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KtaskId(u64);

impl KtaskId {
    fn new() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Convert the task ID to a `u64`.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for KtaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The inner task structure.
pub struct KtaskInner {
    id: KtaskId,
    name: String,
}

/// A reference-counted handle to a task.
pub type KtaskRef = Arc<KtaskInner>;

impl KtaskInner {
    fn new_ref(name: String) -> KtaskRef {
        Arc::new(Self {
            id: KtaskId::new(),
            name,
        })
    }

    /// Gets the ID of the task.
    pub const fn id(&self) -> KtaskId {
        self.id
    }

    /// Gets the name of the task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a combined string of the task ID and name.
    pub fn id_name(&self) -> String {
        format!("Task({}, {:?})", self.id.as_u64(), self.name)
    }
}

impl fmt::Debug for KtaskInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KtaskInner")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<KtaskRef>> = const { RefCell::new(None) };
}

/// Gets the current task.
///
/// A thread that was not created through [`spawn`] becomes a task the first
/// time it asks, named after the thread.
pub fn current() -> KtaskRef {
    CURRENT.with(|curr| {
        curr.borrow_mut()
            .get_or_insert_with(|| {
                let name = thread::current().name().unwrap_or("").to_string();
                KtaskInner::new_ref(name)
            })
            .clone()
    })
}

/// Initializes the task runtime for the calling (boot) task.
pub fn init_scheduler() {
    info!("Initialize scheduling...");
    info!("  boot task: {}", current().id_name());
}

/// Current task gives up the CPU time voluntarily.
pub fn yield_now() {
    thread::yield_now();
}

/// Handle to a spawned task, used to wait for its exit.
pub struct JoinHandle<T> {
    task: KtaskRef,
    thread: thread::JoinHandle<T>,
}

impl<T> JoinHandle<T> {
    /// The task this handle refers to.
    pub fn task(&self) -> &KtaskRef {
        &self.task
    }

    /// Waits for the task to exit and returns its result.
    ///
    /// A panic inside the task is resumed in the joining task.
    pub fn join(self) -> T {
        match self.thread.join() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Spawns a new task with the given name.
///
/// # Panics
///
/// Panics if the host refuses to create another thread.
pub fn spawn_raw<F, T>(f: F, name: String) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task = KtaskInner::new_ref(name);
    let inner = task.clone();
    let builder = thread::Builder::new()
        .name(task.name().to_string())
        .stack_size(TASK_STACK_SIZE);
    let thread = match builder.spawn(move || {
        debug!("task spawned: {}", inner.id_name());
        CURRENT.with(|curr| *curr.borrow_mut() = Some(inner.clone()));
        let ret = f();
        debug!("task exit: {}", inner.id_name());
        ret
    }) {
        Ok(thread) => thread,
        Err(err) => panic!("failed to spawn {}: {}", task.id_name(), err),
    };
    JoinHandle { task, thread }
}

/// Spawns a new task with an empty name.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_raw(f, String::new())
}
