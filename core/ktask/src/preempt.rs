//! Preemption and interrupt-context accounting.
//!
//! Both are per-task state. A task may only sleep when its preemption count
//! is zero and it is not running an interrupt handler.

use std::{cell::Cell, marker::PhantomData};

use kspin::KernelGuardIf;

use crate::current;

thread_local! {
    static PREEMPT_COUNT: Cell<usize> = const { Cell::new(0) };
    static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
}

/// Number of nested preemption-disabled sections of the current task.
pub fn preempt_count() -> usize {
    PREEMPT_COUNT.with(Cell::get)
}

/// Disables preemption of the current task (nests).
pub fn disable_preempt() {
    PREEMPT_COUNT.with(|c| c.set(c.get() + 1));
}

/// Re-enables preemption of the current task.
///
/// # Panics
///
/// Panics if preemption was not disabled.
pub fn enable_preempt() {
    PREEMPT_COUNT.with(|c| {
        let count = c.get();
        assert!(
            count > 0,
            "{} enabled preemption more often than it disabled it",
            current().id_name()
        );
        c.set(count - 1);
    });
}

/// Whether the current task is running an interrupt handler.
pub fn in_interrupt() -> bool {
    IN_INTERRUPT.with(Cell::get)
}

/// Marks the current task as running in interrupt context until dropped.
///
/// ```
/// let irq = ktask::IrqContext::enter();
/// assert!(ktask::in_interrupt());
/// drop(irq);
/// assert!(!ktask::in_interrupt());
/// ```
pub struct IrqContext {
    outer: bool,
    _not_send: PhantomData<*mut ()>,
}

impl IrqContext {
    /// Enters interrupt context.
    pub fn enter() -> Self {
        let outer = IN_INTERRUPT.with(|c| c.replace(true));
        disable_preempt();
        Self {
            outer,
            _not_send: PhantomData,
        }
    }
}

impl Drop for IrqContext {
    fn drop(&mut self) {
        enable_preempt();
        IN_INTERRUPT.with(|c| c.set(self.outer));
    }
}

/// Asserts that the current task is allowed to block.
///
/// Called at every point where a task may go to sleep, whether or not it
/// ends up sleeping.
///
/// # Panics
///
/// Panics in interrupt context or with preemption disabled, e.g. while a
/// `SpinNoPreempt` lock is still held.
#[track_caller]
pub fn might_sleep() {
    assert!(
        !in_interrupt(),
        "{} tried to block in interrupt context",
        current().id_name()
    );
    assert_eq!(
        preempt_count(),
        0,
        "{} tried to block with preemption disabled",
        current().id_name()
    );
}

struct KernelGuardImpl;

#[crate_interface::impl_interface]
impl KernelGuardIf for KernelGuardImpl {
    fn enable_preempt() {
        enable_preempt();
    }

    fn disable_preempt() {
        disable_preempt();
    }
}
