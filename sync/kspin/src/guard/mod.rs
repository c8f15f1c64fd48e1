//! Critical-section guards applied while a spinlock is held.

/// Hooks into the task runtime for preemption control.
///
/// The runtime keeps a per-task preemption counter; while it is non-zero the
/// task must not sleep.
#[crate_interface::def_interface]
pub trait KernelGuardIf {
    /// Re-enable kernel preemption (decrement the nesting count).
    fn enable_preempt();

    /// Disable kernel preemption (increment the nesting count).
    fn disable_preempt();
}

/// Base trait for all guard types.
pub trait BaseGuard {
    /// State saved when entering the critical section.
    type State: Clone + Copy;

    /// Enter the critical section, returning the saved state.
    fn acquire() -> Self::State;

    /// Leave the critical section, restoring `state`.
    fn release(state: Self::State);
}

mod types;

pub use types::{NoOp, NoPreempt};
