// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Classic synchronization problems solved with the `ksync` primitives.
//!
//! - [`stoplight`]: vehicles crossing a four-quadrant intersection, with
//!   per-quadrant [`Lock`](ksync::Lock)s and an admission
//!   [`Semaphore`](ksync::Semaphore).
//! - [`whalemating`]: three roles meeting in triads, with one
//!   [`Mutex`](ksync::Mutex) and a [`Condvar`](ksync::Condvar) per role.
//!
//! Both are driven from outside: the caller spawns one task per vehicle or
//! whale and observes progress through an observer trait.
//!
//! # Example
//!
//! ```no_run
//! use ksynchprobs::stoplight::{Direction, Intersection, IntersectionObserver, Quadrant};
//!
//! struct Quiet;
//!
//! impl IntersectionObserver for Quiet {
//!     fn in_quadrant(&self, _: Quadrant, _: u32) {}
//!     fn leave_intersection(&self, _: u32) {}
//! }
//!
//! let intersection = Intersection::create(Quiet).unwrap();
//! intersection.turn_left(Direction::North, 0);
//! intersection.destroy();
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(test)]
extern crate alloc;

pub mod stoplight;
pub mod whalemating;
