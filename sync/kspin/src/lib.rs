// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

//! Non-blocking spinlocks used to protect the metadata of the blocking
//! primitives in `ksync`.
//!
//! A spinlock here never puts the caller to sleep. It is held only for the
//! duration of a short state check or update, and the sleep queues in
//! `ktask` release it atomically with respect to blocking.
//!
//! # Guards
//!
//! [`SpinLock<G, T>`] is parameterised by a critical-section guard:
//! - [`NoOp`]: nothing besides the lock word.
//! - [`NoPreempt`]: preemption is disabled while the lock is held, through
//!   the [`KernelGuardIf`] interface implemented by the task runtime. A task
//!   that tries to sleep while holding such a lock is caught by the runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kspin::SpinNoPreempt;
//!
//! static COUNTER: SpinNoPreempt<u32> = SpinNoPreempt::new(0);
//!
//! fn increment() {
//!     let mut count = COUNTER.lock();
//!     *count += 1;
//! }
//! ```
//!
//! ## Implementing KernelGuardIf
//!
//! ```rust,ignore
//! use kspin::KernelGuardIf;
//!
//! struct KernelGuardImpl;
//!
//! #[crate_interface::impl_interface]
//! impl KernelGuardIf for KernelGuardImpl {
//!     fn enable_preempt() {
//!         // decrement the per-task preempt counter
//!     }
//!
//!     fn disable_preempt() {
//!         // increment the per-task preempt counter
//!     }
//! }
//! ```

mod guard;
mod lock;

pub use guard::{BaseGuard, KernelGuardIf, NoOp, NoPreempt};
pub use lock::{SpinLock, SpinLockGuard};

/// Raw spinlock with no guards.
///
/// **Warning**: must only be used where preemption is already disabled or
/// cannot affect the critical section.
pub type SpinRaw<T> = SpinLock<NoOp, T>;

/// Guard for [`SpinRaw`].
pub type SpinRawGuard<'a, T> = SpinLockGuard<'a, NoOp, T>;

/// Spinlock that disables preemption while held.
///
/// This is the lock every blocking primitive uses for its own state.
pub type SpinNoPreempt<T> = SpinLock<NoPreempt, T>;

/// Guard for [`SpinNoPreempt`].
pub type SpinNoPreemptGuard<'a, T> = SpinLockGuard<'a, NoPreempt, T>;
