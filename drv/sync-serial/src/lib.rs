// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

//! Interrupt-driven synchronous (SPI-like) framed transport.
//!
//! Grounded on `peripheral/spi/spi.c`/`spi.h` and
//! `peripheral/spi/mapping/spi_map.*`. Structurally identical to
//! `async-serial`'s engine, but words are fixed-width (no 9th bit), there
//! is no parity and no auto-baud, and the two data directions share a
//! single buffer register instead of separate RX/TX registers.

pub mod hw;

use core::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;
use regs::interrupt::Priority;
use regs::{AtomicRegister, InterruptController};
use ringbuf::{ElementKind, RingHandle, RingMode, RingPool};

pub use hw::{DataRegister, HwDataRegister, MockDataRegister};

const SPI_SS_EN_BIT: u32 = 1 << 7;
const SPI_SDI_DIS_BIT: u32 = 1 << 4;
const SPI_SDO_DIS_BIT: u32 = 1 << 12;
const SPI_MODULE_EN_BIT: u32 = 1 << 15;

const SPI_STATUS_OVERRUN_ERROR: u32 = 1 << 6;
const SPI_STATUS_UNDERRUN_ERROR: u32 = 1 << 9;
const SPI_STATUS_FRAMING_ERROR: u32 = 1 << 12;

const SPI_INT_MODE_RX_NOT_EMPTY: u32 = 1 << 0;
const SPI_INT_MODE_RX_FULL: u32 = (1 << 0) | (1 << 1);
const SPI_INT_MODE_TX_NOT_FULL: u32 = (1 << 2) | (1 << 3);

bitflags! {
    /// SPIxCON / SPIxCON2 framing-and-feature bits written by
    /// [`SyncSerial::configure`]. Low 32 bits target SPIxCON, high 32
    /// bits target SPIxCON2.
    pub struct SyncConfig: u64 {
        const CLK_IDLE_HIGH     = 1 << 6;
        const CLK_EDGE_AI       = 1 << 8;
        const STOP_IDLE         = 1 << 13;
        const ENHANCED_BUFFER   = 1 << 16;
        const BAUD_GEN_REFCLK   = 1 << 23;
        const RX_SIGN_EXT_EN    = 1 << (32 + 15);
    }
}

bitflags! {
    /// Mode and word-width bits written by [`SyncSerial::set_properties`].
    pub struct SyncProperties: u32 {
        const MODE_MASTER = 1 << 5;
        const MODE_32     = 1 << 11;
        const MODE_16     = 1 << 10;
    }
}

bitflags! {
    /// Which lines [`SyncSerial::enable`] should bring up: slave select,
    /// serial data in, serial data out.
    pub struct SyncEnable: u8 {
        const SS  = 1 << 0;
        const SDI = 1 << 1;
        const SDO = 1 << 2;
    }
}

bitflags! {
    pub struct SyncError: u8 {
        const FRAME    = 1 << 0;
        const UNDERRUN = 1 << 1;
        const OVERRUN  = 1 << 2;
        const UNKNOWN  = 1 << 7;
    }
}

/// Stable reference to a claimed channel: its fixed slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRef(usize);

/// One channel's wiring into silicon.
pub struct SyncHardware<'a, R: AtomicRegister, D: DataRegister> {
    pub spicon: &'a R,
    pub spicon2: &'a R,
    pub spistat: &'a R,
    pub spibrg: &'a R,
    pub spibuf: &'a D,
    pub fault: &'a dyn InterruptController,
    pub fault_priority: Priority,
    pub rx_done: &'a dyn InterruptController,
    pub rx_priority: Priority,
    pub tx_done: &'a dyn InterruptController,
    pub tx_priority: Priority,
}

#[derive(Default)]
struct ChannelState {
    assigned: bool,
    error: AtomicU8,
    rx: Option<RingHandle>,
    tx: Option<RingHandle>,
}

/// Pool of `CHANNELS` synchronous serial modules.
pub struct SyncSerial<'a, R: AtomicRegister, D: DataRegister, const CHANNELS: usize> {
    hw: [SyncHardware<'a, R, D>; CHANNELS],
    state: [ChannelState; CHANNELS],
    rx_pool: RingPool<'a, CHANNELS>,
    tx_pool: RingPool<'a, CHANNELS>,
}

impl<'a, R: AtomicRegister, D: DataRegister, const CHANNELS: usize> SyncSerial<'a, R, D, CHANNELS> {
    pub fn new(hw: [SyncHardware<'a, R, D>; CHANNELS]) -> Self {
        SyncSerial {
            hw,
            state: core::array::from_fn(|_| ChannelState::default()),
            rx_pool: RingPool::new(),
            tx_pool: RingPool::new(),
        }
    }

    pub fn init(&mut self) {
        for hw in &self.hw {
            hw.fault.disable();
            hw.rx_done.disable();
            hw.tx_done.disable();
        }
        self.state = core::array::from_fn(|_| ChannelState::default());
        self.rx_pool.init();
        self.tx_pool.init();
    }

    /// Claims `channel`, allocating an RX and TX queue of `u32` words over
    /// the caller's buffers.
    pub fn create(
        &mut self,
        channel: usize,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        rx_size: usize,
        tx_size: usize,
    ) -> Option<SyncRef> {
        let slot = self.state.get(channel)?;
        if slot.assigned {
            return None;
        }
        let rx = self.rx_pool.create(rx_buffer, rx_size, RingMode::Fifo, ElementKind::U32)?;
        let tx = match self.tx_pool.create(tx_buffer, tx_size, RingMode::Fifo, ElementKind::U32) {
            Some(tx) => tx,
            None => {
                self.rx_pool.invalidate(rx);
                return None;
            }
        };
        let state = &mut self.state[channel];
        state.assigned = true;
        state.error = AtomicU8::new(0);
        state.rx = Some(rx);
        state.tx = Some(tx);
        Some(SyncRef(channel))
    }

    pub fn invalidate(&mut self, r: SyncRef) {
        let channel = r.0;
        if !self.state[channel].assigned {
            return;
        }
        self.disable(r);
        if let Some(rx) = self.state[channel].rx.take() {
            self.rx_pool.invalidate(rx);
        }
        if let Some(tx) = self.state[channel].tx.take() {
            self.tx_pool.invalidate(tx);
        }
        self.state[channel].assigned = false;
    }

    pub fn is_valid(&self, r: SyncRef) -> bool {
        self.state.get(r.0).is_some_and(|s| s.assigned)
    }

    pub fn configure(&mut self, r: SyncRef, mask: SyncConfig) {
        let channel = r.0;
        if !self.state[channel].assigned {
            return;
        }
        let hw = &self.hw[channel];
        hw.spicon.clear(0x0000_ffff);
        hw.spicon2.clear(0x0000_ffff);
        hw.spicon.set(mask.bits() as u32);
        hw.spicon2.set((mask.bits() >> 32) as u32);
    }

    pub fn set_properties(&mut self, r: SyncRef, mask: SyncProperties) {
        let channel = r.0;
        if !self.state[channel].assigned {
            return;
        }
        let hw = &self.hw[channel];
        hw.spicon.clear((SyncProperties::MODE_MASTER | SyncProperties::MODE_32 | SyncProperties::MODE_16).bits());
        hw.spicon.set(mask.bits());
    }

    /// ÷2 prescaler, 8-bit divisor. Only meaningful in master mode.
    pub fn set_baudrate(&mut self, r: SyncRef, clock_hz: u32, desired_baud: u32) -> u32 {
        let channel = r.0;
        if !self.state[channel].assigned || desired_baud == 0 {
            return 0;
        }
        let hw = &self.hw[channel];
        hw.spibrg.clear(0x0000_00ff);

        let shifted = clock_hz >> 1;
        let mut brg = shifted / desired_baud;
        if brg > 0xff {
            brg = 0xff;
        }
        let actual = if brg == 0 { 0 } else { shifted / brg };
        let brg = if brg > 0 { brg - 1 } else { 0 };
        hw.spibrg.set(brg);
        actual
    }

    /// Full bring-up sequence: disable everything, disable SDI/SDO lines
    /// and drop SS, recover from any latched error, flush both queues,
    /// enable the requested lines and their interrupt modes, then set the
    /// module-enable bit last.
    pub fn enable(&mut self, r: SyncRef, mask: SyncEnable) {
        let channel = r.0;
        if !self.state[channel].assigned {
            return;
        }

        self.hw[channel].fault.disable();
        self.hw[channel].rx_done.disable();
        self.hw[channel].tx_done.disable();

        let hw = &self.hw[channel];
        hw.spicon.clear(SPI_MODULE_EN_BIT);
        hw.spicon.set(SPI_SDI_DIS_BIT | SPI_SDO_DIS_BIT);
        hw.spicon.clear(SPI_SS_EN_BIT);

        if self.state[channel].error.load(Ordering::Relaxed) != 0 {
            hw.spistat.clear(SPI_STATUS_FRAMING_ERROR | SPI_STATUS_UNDERRUN_ERROR | SPI_STATUS_OVERRUN_ERROR);
            self.state[channel].error.store(0, Ordering::Relaxed);
        }

        if let Some(rx) = self.state[channel].rx {
            self.rx_pool.flush(rx);
        }
        if let Some(tx) = self.state[channel].tx {
            self.tx_pool.flush(tx);
        }

        let hw = &self.hw[channel];
        let mut interrupt_mode = 0u32;
        if mask.contains(SyncEnable::SDI) {
            hw.spicon.clear(SPI_SDI_DIS_BIT);
            interrupt_mode |= SPI_INT_MODE_RX_NOT_EMPTY;
        }
        if mask.contains(SyncEnable::SDO) {
            hw.spicon.clear(SPI_SDO_DIS_BIT);
            interrupt_mode |= SPI_INT_MODE_TX_NOT_FULL;
        }
        if mask.contains(SyncEnable::SS) {
            hw.spicon.set(SPI_SS_EN_BIT);
        }

        hw.spicon.clear(SPI_INT_MODE_RX_FULL | SPI_INT_MODE_TX_NOT_FULL);
        hw.spicon.set(interrupt_mode);

        hw.fault.clear_flag();
        hw.rx_done.clear_flag();
        hw.tx_done.clear_flag();
        hw.fault.enable(hw.fault_priority);
        hw.rx_done.enable(hw.rx_priority);
        hw.spicon.set(SPI_MODULE_EN_BIT);
    }

    pub fn disable(&mut self, r: SyncRef) {
        let channel = r.0;
        if !self.state[channel].assigned {
            return;
        }
        let hw = &self.hw[channel];
        hw.fault.disable();
        hw.rx_done.disable();
        hw.tx_done.disable();
        hw.spicon.clear(SPI_MODULE_EN_BIT);
        hw.spicon.set(SPI_SDI_DIS_BIT | SPI_SDO_DIS_BIT);
        hw.spicon.clear(SPI_SS_EN_BIT);
    }

    /// On a latched error: reconstructs the currently enabled line mask
    /// bit-by-bit (each test parenthesized explicitly, unlike the
    /// original's ternary-then-OR chain, whose `:` binds looser than `|`
    /// and so very likely produces the wrong mask), disables, then
    /// re-enables with that mask.
    pub fn reset(&mut self, r: SyncRef) {
        let channel = r.0;
        if !self.state[channel].assigned || self.state[channel].error.load(Ordering::Relaxed) == 0 {
            return;
        }
        let status = self.hw[channel].spicon.read();
        let mut mask = SyncEnable::empty();
        if status & SPI_SS_EN_BIT != 0 {
            mask |= SyncEnable::SS;
        }
        if status & SPI_SDI_DIS_BIT == 0 {
            mask |= SyncEnable::SDI;
        }
        if status & SPI_SDO_DIS_BIT == 0 {
            mask |= SyncEnable::SDO;
        }
        self.disable(r);
        self.enable(r, mask);
    }

    pub fn error(&self, r: SyncRef) -> SyncError {
        self.state
            .get(r.0)
            .map(|s| SyncError::from_bits_truncate(s.error.load(Ordering::Relaxed)))
            .unwrap_or_else(SyncError::empty)
    }

    pub fn transmit(&mut self, r: SyncRef, data: &[u32]) -> usize {
        let channel = r.0;
        if !self.state[channel].assigned || self.state[channel].error.load(Ordering::Relaxed) != 0 {
            return 0;
        }
        let Some(handle) = self.state[channel].tx else {
            return 0;
        };

        self.hw[channel].tx_done.disable();
        let mut n = 0;
        while n < data.len() && self.tx_pool.add(handle, &data[n]) {
            n += 1;
        }
        self.hw[channel].tx_done.enable(self.hw[channel].tx_priority);
        n
    }

    pub fn receive(&mut self, r: SyncRef, out: &mut [u32]) -> usize {
        let channel = r.0;
        if !self.state[channel].assigned || self.state[channel].error.load(Ordering::Relaxed) != 0 {
            return 0;
        }
        let Some(handle) = self.state[channel].rx else {
            return 0;
        };

        self.hw[channel].rx_done.disable();
        let mut n = 0;
        while n < out.len() {
            match self.rx_pool.take::<u32>(handle) {
                Some(v) => {
                    out[n] = v;
                    n += 1;
                }
                None => break,
            }
        }
        self.hw[channel].rx_done.enable(self.hw[channel].rx_priority);
        n
    }

    pub fn rx_available(&self, r: SyncRef) -> bool {
        self.state[r.0].rx.is_some_and(|h| !self.rx_pool.is_empty(h))
    }

    pub fn tx_available(&self, r: SyncRef) -> bool {
        self.state[r.0].tx.is_some_and(|h| !self.tx_pool.is_full(h))
    }

    /// Single ISR entry point for channel `channel`. Unlike the async
    /// engine's fault/RX/TX `else if` chain, the original services RX-done
    /// and TX-done as two independent `if`s once no fault was pending, and
    /// this port keeps that shape.
    pub fn handle_interrupt(&mut self, channel: usize) {
        let hw = &self.hw[channel];
        if hw.fault.get_flag() {
            let status = hw.spistat.read();
            let mut err = SyncError::empty();
            if status & SPI_STATUS_FRAMING_ERROR != 0 {
                err |= SyncError::FRAME;
            }
            if status & SPI_STATUS_UNDERRUN_ERROR != 0 {
                err |= SyncError::UNDERRUN;
            }
            if status & SPI_STATUS_OVERRUN_ERROR != 0 {
                err |= SyncError::OVERRUN;
            }
            if err.is_empty() {
                err = SyncError::UNKNOWN;
            }
            self.state[channel].error.fetch_or(err.bits(), Ordering::Relaxed);

            hw.fault.disable();
            hw.rx_done.disable();
            hw.tx_done.disable();
            hw.fault.clear_flag();
            return;
        }

        if hw.rx_done.get_flag() {
            let raw = hw.spibuf.read();
            if let Some(handle) = self.state[channel].rx {
                self.rx_pool.add(handle, &raw);
            }
            self.hw[channel].rx_done.clear_flag();
        }
        if self.hw[channel].tx_done.get_flag() {
            if let Some(handle) = self.state[channel].tx {
                if let Some(value) = self.tx_pool.take::<u32>(handle) {
                    self.hw[channel].spibuf.write(value);
                }
                if self.tx_pool.is_empty(handle) {
                    self.hw[channel].tx_done.disable();
                }
            }
            self.hw[channel].tx_done.clear_flag();
        }
    }
}
