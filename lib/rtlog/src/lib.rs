// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

//! Ambient diagnostic log ring, independent of the typed I/O ring buffers in
//! `lib/ringbuf`. Grounded on the teacher's `lib/ringbuf::stringbuf` module
//! (`Stringbuf<N>`, the `stringbuf!`/`stringbuf_entry!` macro pair) and the
//! `sys_log!` feature-gated backend selection used by its `task/aontimer`
//! binaries — reworked without the teacher's IPC-era `StaticCell`, which is
//! internal to its kernel and has no standalone crate to depend on here.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// A fixed-capacity ring of recent log bytes, overwriting the oldest entry
/// once full. Implements [`fmt::Write`] so `write!`/`writeln!` work directly
/// against it, the way `Stringbuf` does in the teacher crate.
pub struct LogRing<const N: usize> {
    buffer: [u8; N],
    next: usize,
    filled: bool,
}

impl<const N: usize> LogRing<N> {
    pub const fn new() -> Self {
        LogRing {
            buffer: [0; N],
            next: 0,
            filled: false,
        }
    }

    pub fn push(&mut self, byte: u8) {
        self.buffer[self.next] = byte;
        self.next += 1;
        if self.next == N {
            self.next = 0;
            self.filled = true;
        }
    }

    /// Returns the logged bytes in chronological order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let (tail, head) = if self.filled {
            (&self.buffer[self.next..], &self.buffer[..self.next])
        } else {
            (&self.buffer[..0], &self.buffer[..self.next])
        };
        tail.iter().chain(head.iter()).copied()
    }
}

impl<const N: usize> Default for LogRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for LogRing<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.as_bytes() {
            self.push(*b);
        }
        Ok(())
    }
}

/// A statically-allocated, single-borrower cell for a log ring.
///
/// Mirrors the role `StaticCell` plays for the teacher's `stringbuf!`, but
/// without the IPC/task machinery that crate is internal to: a single
/// foreground + interrupt context is expected to hold the borrow briefly
/// (just long enough to append an entry) and release it before returning.
pub struct LogCell<T> {
    inner: UnsafeCell<T>,
    borrowed: AtomicBool,
}

unsafe impl<T> Sync for LogCell<T> {}

impl<T> LogCell<T> {
    pub const fn new(value: T) -> Self {
        LogCell {
            inner: UnsafeCell::new(value),
            borrowed: AtomicBool::new(false),
        }
    }

    /// Borrows the inner value. Panics if already borrowed — log entries
    /// must be appended without holding the borrow across a call that could
    /// re-enter (in particular, never across an interrupt boundary).
    pub fn borrow_mut(&self) -> LogCellGuard<'_, T> {
        if self.borrowed.swap(true, Ordering::Acquire) {
            panic!("LogCell already borrowed");
        }
        LogCellGuard { cell: self }
    }
}

pub struct LogCellGuard<'a, T> {
    cell: &'a LogCell<T>,
}

impl<'a, T> core::ops::Deref for LogCellGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.cell.inner.get() }
    }
}

impl<'a, T> core::ops::DerefMut for LogCellGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.inner.get() }
    }
}

impl<'a, T> Drop for LogCellGuard<'a, T> {
    fn drop(&mut self) {
        self.cell.borrowed.store(false, Ordering::Release);
    }
}

/// Declares a named, statically-allocated log ring with room for `N` bytes.
#[macro_export]
macro_rules! logbuf {
    ($name:ident, $n:expr) => {
        pub static $name: $crate::LogCell<$crate::LogRing<$n>> =
            $crate::LogCell::new($crate::LogRing::new());
    };
    ($n:expr) => {
        $crate::logbuf!(RTLOG, $n);
    };
}

/// Appends a formatted entry to a ring declared with [`logbuf!`].
#[macro_export]
macro_rules! log_entry {
    ($buf:expr, $($arg:tt)*) => {{
        use core::fmt::Write;
        let mut guard = $buf.borrow_mut();
        let _ = write!(&mut *guard, $($arg)*);
    }};
}

logbuf!(RTLOG, 256);

cfg_if::cfg_if! {
    if #[cfg(feature = "backend-semihosting")] {
        /// Writes a formatted entry both into the default ring and out to
        /// the host via semihosting, the way the teacher's kernel selects
        /// its `klog-semihosting` feature to swap `hprintln!` in for a no-op.
        #[macro_export]
        macro_rules! klog {
            ($($arg:tt)*) => {{
                $crate::log_entry!($crate::RTLOG, $($arg)*);
                let _ = $crate::riscv_semihosting::hprintln!($($arg)*);
            }};
        }
    } else {
        /// Writes a formatted entry into the default ring only; no
        /// semihosting call, matching the teacher's default (non-`klog-
        /// semihosting`) arm of the same `cfg_if!`.
        #[macro_export]
        macro_rules! klog {
            ($($arg:tt)*) => {{
                $crate::log_entry!($crate::RTLOG, $($arg)*);
            }};
        }
    }
}

#[cfg(feature = "backend-semihosting")]
pub use riscv_semihosting;

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn ring_wraps_and_preserves_order() {
        let mut ring: LogRing<4> = LogRing::new();
        ring.write_str("abcdef").unwrap();
        let collected: std::vec::Vec<u8> = ring.iter().collect();
        assert_eq!(collected, b"cdef");
    }

    #[test]
    fn cell_guard_releases_borrow() {
        let cell = LogCell::new(LogRing::<8>::new());
        {
            let mut guard = cell.borrow_mut();
            guard.write_str("hi").unwrap();
        }
        let guard = cell.borrow_mut();
        let out: std::vec::Vec<u8> = guard.iter().collect();
        assert_eq!(out, b"hi");
    }

    #[test]
    #[should_panic]
    fn double_borrow_panics() {
        let cell = LogCell::new(LogRing::<4>::new());
        let _a = cell.borrow_mut();
        let _b = cell.borrow_mut();
    }

    #[test]
    fn log_entry_macro_writes_through() {
        logbuf!(SCRATCH, 32);
        log_entry!(SCRATCH, "n={}", 42);
        let guard = SCRATCH.borrow_mut();
        let out: std::vec::Vec<u8> = guard.iter().collect();
        assert_eq!(out, b"n=42");
    }
}
