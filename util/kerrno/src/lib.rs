// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Recoverable error codes for the synchronization layer.
//!
//! Only resource exhaustion and malformed arguments are recoverable; misuse
//! of a primitive (releasing a lock one does not hold, sleeping in an
//! interrupt handler, ...) is a fatal assertion, not a [`KError`].

#![cfg_attr(not(test), no_std)]

use core::fmt;

use strum::EnumCount;

/// The error kind type.
///
/// Similar to [`std::io::ErrorKind`].
///
/// [`std::io::ErrorKind`]: https://doc.rust-lang.org/std/io/enum.ErrorKind.html
#[repr(i32)]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumCount)]
pub enum KErrorKind {
    /// Invalid parameter/argument.
    InvalidInput = 1,
    /// Not enough space/cannot allocate memory.
    NoMemory,
}

impl KErrorKind {
    /// Returns the error description.
    pub fn as_str(&self) -> &'static str {
        use KErrorKind::*;
        match *self {
            InvalidInput => "Invalid input parameter",
            NoMemory => "Out of memory",
        }
    }

    /// Returns the error code value in `i32`.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for KErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error type returned by fallible constructors.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KError(KErrorKind);

impl KError {
    const fn new(kind: KErrorKind) -> Self {
        KError(kind)
    }

    /// Returns the error kind.
    pub const fn kind(self) -> KErrorKind {
        self.0
    }

    /// Returns the error code value in `i32`.
    pub const fn code(self) -> i32 {
        self.0.code()
    }
}

impl From<KErrorKind> for KError {
    fn from(kind: KErrorKind) -> Self {
        KError::new(kind)
    }
}

impl From<KError> for KErrorKind {
    fn from(e: KError) -> Self {
        e.0
    }
}

impl fmt::Debug for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KErrorKind::{:?}", self.0)
    }
}

impl fmt::Display for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl core::error::Error for KError {}

macro_rules! kerror_consts {
    ($($name:ident),*) => {
        #[allow(non_upper_case_globals)]
        impl KError {
            $(
                #[doc = concat!("An [`KError`] with kind [`KErrorKind::", stringify!($name), "`].")]
                pub const $name: Self = Self::new(KErrorKind::$name);
            )*
        }
    };
}

kerror_consts!(InvalidInput, NoMemory);

/// A specialized [`Result`] type with [`KError`] as the error type.
pub type KResult<T = ()> = Result<T, KError>;

/// Convenience method to construct an [`KError`] type while printing a warning
/// message.
///
/// # Examples
///
/// ```
/// # use kerrno::{k_err_type, KError};
/// #
/// // Also print "[KErrorKind::NoMemory]" if a logger is installed.
/// assert_eq!(k_err_type!(NoMemory), KError::NoMemory);
///
/// // Also print "[KErrorKind::InvalidInput] direction 7" if a logger is installed.
/// assert_eq!(k_err_type!(InvalidInput, "direction 7"), KError::InvalidInput);
/// ```
#[macro_export]
macro_rules! k_err_type {
    ($err:ident) => {{
        use $crate::KErrorKind::*;
        let err = $crate::KError::from($err);
        $crate::__priv::warn!("[{:?}]", err);
        err
    }};
    ($err:ident, $msg:expr) => {{
        use $crate::KErrorKind::*;
        let err = $crate::KError::from($err);
        $crate::__priv::warn!("[{:?}] {}", err, $msg);
        err
    }};
}

#[doc(hidden)]
pub mod __priv {
    pub use log::warn;
}
