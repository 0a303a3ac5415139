// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware free-running timer contract consumed by [`crate::Scheduler`].
//!
//! Grounded on the original's `HW_TIMER`/`HW_TIMER_CFG_REG` macro family
//! (`kernel/scheduler/scheduler.c`): a 16-bit up-counter plus a control
//! register holding a word-sized configuration value and an explicit enable
//! bit. `configure` performs the same three-step program the original's
//! `scheduler_init` inlines: clear enable, write the configuration word, set
//! enable.

/// A 16-bit free-running hardware counter driving the scheduler's dispatch
/// loop, plus the one-time programming sequence for its control register.
pub trait HwTimer {
    /// Current counter value. Read once per [`crate::Scheduler::execute`]
    /// pass; comparisons against the previous reading use wrapping 16-bit
    /// subtraction, so no particular reset value is required.
    fn read(&self) -> u16;

    /// Clears the enable bit, writes `config_word`, then sets `enable_bit`.
    fn configure(&self, config_word: u32, enable_bit: u32);
}

/// Software stand-in for a real hardware timer, used by unit tests and by
/// hosts without a board. The test advances it explicitly; `configure` only
/// records its arguments for assertions.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use core::cell::Cell;

    pub struct MockTimer {
        pub counter: Cell<u16>,
        pub last_config: Cell<Option<(u32, u32)>>,
    }

    impl MockTimer {
        pub const fn new() -> Self {
            MockTimer {
                counter: Cell::new(0),
                last_config: Cell::new(None),
            }
        }

        pub fn advance(&self, ticks: u16) {
            self.counter.set(self.counter.get().wrapping_add(ticks));
        }
    }

    impl Default for MockTimer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl super::HwTimer for MockTimer {
        fn read(&self) -> u16 {
            self.counter.get()
        }

        fn configure(&self, config_word: u32, enable_bit: u32) {
            self.last_config.set(Some((config_word, enable_bit)));
        }
    }
}
