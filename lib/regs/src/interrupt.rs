// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt controller adapter.
//!
//! Grounded on `peripheral/interrupt/interrupt.c`: each interrupt source is
//! described by pointers into the vectored interrupt controller's flag,
//! enable, priority and sub-priority registers plus the bitmasks within
//! them, the same shape as the original's `InterruptMap` table.

use crate::AtomicRegister;

/// Priority level accepted by [`InterruptController::set_priority`]. `0`
/// disables the source at the controller; the highest level preempts all
/// lower ones.
pub type Priority = u8;

pub const PRIORITY_DISABLED: Priority = 0;
pub const PRIORITY_MAX: Priority = 7;

/// One interrupt source's wiring into the controller's register set.
///
/// `priority_mask`/`sub_priority_mask` select this source's field within a
/// register shared by several sources; `priority_shift`/`sub_priority_shift`
/// give the field's bit position, mirroring the original's
/// `compute_lsb_pos(mask)` helper.
pub struct InterruptDescriptor<'a, R: AtomicRegister> {
    pub flag: &'a R,
    pub flag_mask: u32,
    pub enable: &'a R,
    pub enable_mask: u32,
    pub priority: &'a R,
    pub priority_mask: u32,
    pub priority_shift: u32,
    pub sub_priority: &'a R,
    pub sub_priority_mask: u32,
    pub sub_priority_shift: u32,
}

/// Per-source operations offered by the vectored interrupt controller.
pub trait InterruptController {
    fn enable(&self, priority: Priority);
    fn disable(&self);
    fn set_priority(&self, priority: Priority);
    fn set_sub_priority(&self, priority: Priority);
    fn get_flag(&self) -> bool;
    fn clear_flag(&self);
}

impl<'a, R: AtomicRegister> InterruptController for InterruptDescriptor<'a, R> {
    fn enable(&self, priority: Priority) {
        self.enable.set(self.enable_mask);
        self.priority.clear(self.priority_mask);
        self.priority
            .set(self.priority_mask & ((priority as u32) << self.priority_shift));
    }

    fn disable(&self) {
        self.enable.clear(self.enable_mask);
        self.priority.clear(self.priority_mask);
    }

    fn set_priority(&self, priority: Priority) {
        self.priority.clear(self.priority_mask);
        self.priority
            .set(self.priority_mask & ((priority as u32) << self.priority_shift));
    }

    fn set_sub_priority(&self, priority: Priority) {
        self.sub_priority.clear(self.sub_priority_mask);
        self.sub_priority
            .set(self.sub_priority_mask & ((priority as u32) << self.sub_priority_shift));
    }

    fn get_flag(&self) -> bool {
        (self.flag.read() & self.flag_mask) != 0
    }

    fn clear_flag(&self) {
        self.flag.clear(self.flag_mask);
    }
}

/// Switches the controller into multivector mode, where each interrupt
/// source is dispatched to its own vector instead of a single shared one.
/// Mirrors the original's `interrupt_enable_mvec`/`INTCON_MVEC_BIT` pair:
/// the mode lives in one bit of a controller-wide configuration register,
/// so it takes that register and its bitmask rather than a per-source
/// descriptor.
pub fn enable_multivector_mode<R: AtomicRegister>(intcon: &R, mvec_mask: u32) {
    intcon.set(mvec_mask);
}

/// Reverts to single-vector mode.
pub fn disable_multivector_mode<R: AtomicRegister>(intcon: &R, mvec_mask: u32) {
    intcon.clear(mvec_mask);
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "riscv32")] {
        /// Enables interrupts globally on the current hart.
        pub fn global_enable() {
            unsafe { riscv::register::mstatus::set_mie() };
        }

        /// Disables interrupts globally on the current hart.
        pub fn global_disable() {
            riscv::register::mstatus::clear_mie();
        }
    } else if #[cfg(any(target_arch = "arm"))] {
        /// Enables interrupts globally on the current core.
        pub fn global_enable() {
            unsafe { cortex_m::interrupt::enable() };
        }

        /// Disables interrupts globally on the current core.
        pub fn global_disable() {
            cortex_m::interrupt::disable();
        }
    } else {
        /// No-op on hosts without a real interrupt controller (used by tests).
        pub fn global_enable() {}

        /// No-op on hosts without a real interrupt controller (used by tests).
        pub fn global_disable() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockRegister;

    #[test]
    fn enable_sets_mask_and_priority_field() {
        let flag = MockRegister::new(0);
        let enable = MockRegister::new(0);
        let priority = MockRegister::new(0);
        let sub_priority = MockRegister::new(0);
        let desc = InterruptDescriptor {
            flag: &flag,
            flag_mask: 0b1,
            enable: &enable,
            enable_mask: 0b1,
            priority: &priority,
            priority_mask: 0b111 << 2,
            priority_shift: 2,
            sub_priority: &sub_priority,
            sub_priority_mask: 0b11,
            sub_priority_shift: 0,
        };

        desc.enable(5);
        assert_eq!(enable.read(), 0b1);
        assert_eq!(priority.read(), 5 << 2);

        desc.disable();
        assert_eq!(enable.read(), 0);
        assert_eq!(priority.read(), 0);
    }

    #[test]
    fn flag_get_and_clear() {
        let flag = MockRegister::new(0b100);
        let enable = MockRegister::new(0);
        let priority = MockRegister::new(0);
        let sub_priority = MockRegister::new(0);
        let desc = InterruptDescriptor {
            flag: &flag,
            flag_mask: 0b100,
            enable: &enable,
            enable_mask: 0,
            priority: &priority,
            priority_mask: 0,
            priority_shift: 0,
            sub_priority: &sub_priority,
            sub_priority_mask: 0,
            sub_priority_shift: 0,
        };

        assert!(desc.get_flag());
        desc.clear_flag();
        assert!(!desc.get_flag());
    }

    #[test]
    fn multivector_mode_sets_and_clears_its_bit_only() {
        let intcon = MockRegister::new(0b1);
        enable_multivector_mode(&intcon, 1 << 12);
        assert_eq!(intcon.read(), 0b1 | (1 << 12));
        disable_multivector_mode(&intcon, 1 << 12);
        assert_eq!(intcon.read(), 0b1);
    }
}
