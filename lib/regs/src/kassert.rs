// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug-only programmer-error halt, grounded on `lib/print/assert.c`'s
//! `ASSERT`/`__assert_print`/`assert_halt` trio. Formatted diagnostic output
//! is out of scope for this crate (see `lib/printstream`); a hook lets an
//! application wire the halt into whatever logging it has configured.

use core::sync::atomic::{AtomicPtr, Ordering};

/// Called with the source file and line of a failed [`kassert!`] just before
/// the core halts. Defaults to doing nothing.
pub type AssertHook = fn(file: &'static str, line: u32);

static HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Installs a hook invoked on assertion failure, before the halt loop.
pub fn set_hook(hook: AssertHook) {
    HOOK.store(hook as *mut (), Ordering::Release);
}

/// Invoked by [`kassert!`] on failure. Never returns.
#[doc(hidden)]
pub fn fail(file: &'static str, line: u32) -> ! {
    let ptr = HOOK.load(Ordering::Acquire);
    if !ptr.is_null() {
        let hook: AssertHook = unsafe { core::mem::transmute(ptr) };
        hook(file, line);
    }
    loop {
        core::hint::spin_loop();
    }
}

/// Debug-only assertion. Compiled out entirely in release builds, matching
/// the original's intent of zero runtime cost outside of development.
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::kassert::fail(file!(), line!());
        }
    };
}
