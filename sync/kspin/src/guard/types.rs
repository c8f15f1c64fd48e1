//! Concrete guard types.

use super::BaseGuard;

/// Guard that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl BaseGuard for NoOp {
    type State = ();

    #[inline(always)]
    fn acquire() -> Self::State {}

    #[inline(always)]
    fn release(_state: Self::State) {}
}

/// Guard that holds off preemption of the current task.
///
/// Nesting is allowed; preemption comes back once every guard is gone.
#[derive(Debug)]
pub struct NoPreempt;

impl BaseGuard for NoPreempt {
    type State = ();

    #[inline]
    fn acquire() -> Self::State {
        crate_interface::call_interface!(crate::guard::KernelGuardIf::disable_preempt);
    }

    #[inline]
    fn release(_state: Self::State) {
        crate_interface::call_interface!(crate::guard::KernelGuardIf::enable_preempt);
    }
}

impl NoPreempt {
    /// Disables preemption until the returned guard is dropped.
    #[inline]
    pub fn new() -> Self {
        <Self as BaseGuard>::acquire();
        Self
    }
}

impl Default for NoPreempt {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoPreempt {
    #[inline]
    fn drop(&mut self) {
        <Self as BaseGuard>::release(())
    }
}
