// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! This module provides the task runtime the blocking primitives sit on:
//! task identity, task creation, preemption and interrupt-context
//! accounting, and sleep queues.
//!
//! Tasks are backed by host threads. A task's identity ([`KtaskId`]) is an
//! opaque value that is only ever compared; nothing in `ksync` looks inside a
//! task.
//!
//! # Cargo Features
//!
//! - `watchdog`: Track which task holds and which task waits for each lock,
//!   so that a wait closing a cycle is reported instead of hanging.

#[macro_use]
extern crate log;

/// Stack size of tasks created by [`spawn`] and [`spawn_raw`].
pub const TASK_STACK_SIZE: usize = 0x40000;

mod preempt;
mod task;
mod wait_queue;
#[cfg(feature = "watchdog")]
pub mod watchdog;

pub mod future;

#[cfg(test)]
mod tests;

pub use self::{
    preempt::{
        IrqContext, disable_preempt, enable_preempt, in_interrupt, might_sleep, preempt_count,
    },
    task::{
        JoinHandle, KtaskId, KtaskInner, KtaskRef, current, init_scheduler, spawn, spawn_raw,
        yield_now,
    },
    wait_queue::WaitQueue,
};
