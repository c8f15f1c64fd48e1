// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Kernel synchronization primitives.
//!
//! This crate provides blocking synchronization primitives for kernel tasks:
//!
//! - [`Semaphore`]: Counting semaphore for resource management
//! - [`Lock`]: Mutual exclusion lock that knows its holder, with the
//!   data-carrying [`Mutex`] built on it
//! - [`Condvar`]: Condition variable used together with a [`Lock`]
//! - [`RwLock`]: Reader-writer lock (allows multiple readers or one writer)
//!   with a pluggable [`WriterPolicy`], and the data-carrying [`RwCell`]
//! - [`spin`]: Re-export of `kspin` for spinlocks
//!
//! Every primitive keeps its state behind a `kspin` spinlock that is held
//! only for the check or update and never across a sleep. Blocking goes
//! through [`ktask::WaitQueue`]. Blocking is a fatal error in interrupt
//! context or with preemption disabled.
//!
//! # Examples
//!
//! ## Mutex
//! ```no_run
//! use ksync::Mutex;
//!
//! static DATA: Mutex<Vec<u8>> = Mutex::new(Vec::new());
//!
//! fn task() {
//!     let mut data = DATA.lock();
//!     data.push(42);
//! }
//! ```
//!
//! ## Lock and Condvar
//! ```no_run
//! use core::sync::atomic::{AtomicBool, Ordering};
//!
//! use ksync::{Condvar, Lock};
//!
//! static LOCK: Lock = Lock::new("ready");
//! static READY: Condvar = Condvar::new("ready");
//! // Only touched with LOCK held.
//! static FLAG: AtomicBool = AtomicBool::new(false);
//!
//! fn waiter() {
//!     LOCK.acquire();
//!     while !FLAG.load(Ordering::Relaxed) {
//!         READY.wait(&LOCK);
//!     }
//!     LOCK.release();
//! }
//!
//! fn waker() {
//!     LOCK.acquire();
//!     FLAG.store(true, Ordering::Relaxed);
//!     READY.broadcast(&LOCK);
//!     LOCK.release();
//! }
//! ```
//!
//! ## RwLock
//! ```no_run
//! use ksync::RwCell;
//!
//! static CONFIG: RwCell<u32> = RwCell::new(0);
//!
//! fn reader() {
//!     let config = CONFIG.read();
//!     // multiple readers allowed
//! }
//!
//! fn writer() {
//!     let mut config = CONFIG.write();
//!     // exclusive writer
//! }
//! ```
//!
//! ## Semaphore
//! ```no_run
//! use ksync::Semaphore;
//!
//! static SEM: Semaphore = Semaphore::new("slots", 3);
//!
//! fn task() {
//!     let _guard = SEM.acquire_guard();
//!     // do work with permit
//!     // permit automatically released when guard is dropped
//! }
//! ```
//!
//! # Features
//!
//! - `watchdog`: Report lock dependency cycles as a panic instead of
//!   sleeping forever

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub use kspin as spin;

mod condvar;
mod lock;
mod rwlock;
mod semaphore;
mod util;

pub use self::{
    condvar::Condvar,
    lock::{Lock, Mutex, MutexGuard, destroy_mutex},
    rwlock::{CoinFlip, RwCell, RwCellReadGuard, RwCellWriteGuard, RwLock, WriterPolicy},
    semaphore::{Semaphore, SemaphoreGuard},
};
