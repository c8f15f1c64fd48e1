//! Lock dependency tracking.
//!
//! Every sleeping lock reports three events: a task is about to wait for it,
//! a task acquired it, a task released it. From these the watchdog keeps a
//! wait-for table. A wait that would close a cycle (the lock is held by a
//! task that, through a chain of waits, is waiting for the caller) is refused
//! with the cycle, so the lock can turn it into a panic instead of hanging.
//!
//! Locks are identified by address.

use std::{collections::BTreeMap, fmt};

use kspin::SpinNoPreempt;

use crate::{KtaskId, current};

struct WaitForTable {
    holders: BTreeMap<usize, KtaskId>,
    waiting: BTreeMap<KtaskId, usize>,
}

static TABLE: SpinNoPreempt<WaitForTable> = SpinNoPreempt::new(WaitForTable {
    holders: BTreeMap::new(),
    waiting: BTreeMap::new(),
});

/// A chain of waits that leads back to the task that asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockCycle {
    /// Each edge is a task and the lock it waits for; the first edge is the
    /// refused wait, the holder of the last lock is the first task.
    pub edges: Vec<(KtaskId, usize)>,
}

impl fmt::Display for DeadlockCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (task, lock)) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "task {} waits for {:#x}", task, lock)?;
        }
        Ok(())
    }
}

/// Records that the current task is about to wait for `lock`.
///
/// Returns the cycle instead if the wait could never end.
pub fn wait(lock: usize) -> Result<(), DeadlockCycle> {
    let me = current().id();
    let mut table = TABLE.lock();
    let mut edges = vec![(me, lock)];
    let mut next = lock;
    while let Some(&holder) = table.holders.get(&next) {
        if holder == me {
            drop(table);
            let cycle = DeadlockCycle { edges };
            error!("deadlock detected: {}", cycle);
            return Err(cycle);
        }
        let Some(&wanted) = table.waiting.get(&holder) else {
            break;
        };
        edges.push((holder, wanted));
        next = wanted;
        // A cycle that does not pass through us is somebody else's report.
        if edges.len() > table.waiting.len() + 1 {
            break;
        }
    }
    table.waiting.insert(me, lock);
    Ok(())
}

/// Records that the current task now holds `lock`.
pub fn acquired(lock: usize) {
    let me = current().id();
    let mut table = TABLE.lock();
    table.waiting.remove(&me);
    table.holders.insert(lock, me);
}

/// Records that `lock` is free again.
pub fn released(lock: usize) {
    TABLE.lock().holders.remove(&lock);
}

/// Task holding `lock`, as far as the watchdog knows.
pub fn holder_of(lock: usize) -> Option<KtaskId> {
    TABLE.lock().holders.get(&lock).copied()
}

/// Lock `task` is waiting for, as far as the watchdog knows.
pub fn waiting_for(task: KtaskId) -> Option<usize> {
    TABLE.lock().waiting.get(&task).copied()
}
