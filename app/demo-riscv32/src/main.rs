// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worked illustration of how the workspace's library and driver crates are
//! wired onto one board: a module-initialization table, a populated
//! scheduler, one UART channel carrying the console, one SPI channel, and
//! the main dispatch loop. Grounded on `examples/original_source/main.c`.
//!
//! Peripheral base addresses below are illustrative stand-ins for a real
//! board support package's memory map (normally pulled from a linker script
//! or an `svd`-generated crate); nothing here targets a specific chip.

#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;

use async_serial::{AsyncSerial, UartConfig, UartEnable, UartHardware, UartProperties, UartRef};
use printstream::{PrintStream, StreamTransport};
use regs::interrupt::InterruptDescriptor;
use regs::{AtomicRegister, HwRegister};
use scheduler::{HwTimer, IntervalUnit, Scheduler, SystemClock};
use sync_serial::{SyncEnable, SyncHardware, SyncSerial};
use swtimer::{SoftTimers, TimerRef, TimerType};

const UART_CHANNELS: usize = 1;
const SPI_CHANNELS: usize = 1;
const SCHEDULER_EVENTS: usize = 4;
const SCHEDULER_TASKS: usize = 2;

mod addr {
    pub const U1MODE: usize = 0x1000_0000;
    pub const U1STA: usize = 0x1000_0010;
    pub const U1BRG: usize = 0x1000_0040;
    pub const U1RXREG: usize = 0x1000_0030;
    pub const U1TXREG: usize = 0x1000_0020;

    pub const SPI1CON: usize = 0x1000_1000;
    pub const SPI1CON2: usize = 0x1000_1010;
    pub const SPI1STAT: usize = 0x1000_1020;
    pub const SPI1BRG: usize = 0x1000_1030;
    pub const SPI1BUF: usize = 0x1000_1040;

    pub const IFS0: usize = 0x1000_2000;
    pub const IEC0: usize = 0x1000_2010;
    pub const IPC6: usize = 0x1000_2060;
    pub const IPC7: usize = 0x1000_2070;
    pub const INTCON: usize = 0x1000_2080;

    pub const T1CON: usize = 0x1000_3000;
    pub const TMR1: usize = 0x1000_3010;
}

static U1MODE: HwRegister = unsafe { HwRegister::new(addr::U1MODE) };
static U1STA: HwRegister = unsafe { HwRegister::new(addr::U1STA) };
static U1BRG: HwRegister = unsafe { HwRegister::new(addr::U1BRG) };
static U1RXREG: async_serial::HwDataRegister = unsafe { async_serial::HwDataRegister::new(addr::U1RXREG) };
static U1TXREG: async_serial::HwDataRegister = unsafe { async_serial::HwDataRegister::new(addr::U1TXREG) };

static SPI1CON: HwRegister = unsafe { HwRegister::new(addr::SPI1CON) };
static SPI1CON2: HwRegister = unsafe { HwRegister::new(addr::SPI1CON2) };
static SPI1STAT: HwRegister = unsafe { HwRegister::new(addr::SPI1STAT) };
static SPI1BRG: HwRegister = unsafe { HwRegister::new(addr::SPI1BRG) };
static SPI1BUF: sync_serial::HwDataRegister = unsafe { sync_serial::HwDataRegister::new(addr::SPI1BUF) };

static IFS0: HwRegister = unsafe { HwRegister::new(addr::IFS0) };
static IEC0: HwRegister = unsafe { HwRegister::new(addr::IEC0) };
static IPC6: HwRegister = unsafe { HwRegister::new(addr::IPC6) };
static IPC7: HwRegister = unsafe { HwRegister::new(addr::IPC7) };
static INTCON: HwRegister = unsafe { HwRegister::new(addr::INTCON) };

const INTCON_MVEC_BIT: u32 = 1 << 12;

static U1_FAULT: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 7,
    enable: &IEC0,
    enable_mask: 1 << 7,
    priority: &IPC6,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC6,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};
static U1_RX: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 8,
    enable: &IEC0,
    enable_mask: 1 << 8,
    priority: &IPC6,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC6,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};
static U1_TX: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 9,
    enable: &IEC0,
    enable_mask: 1 << 9,
    priority: &IPC6,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC6,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};

static SPI1_FAULT: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 20,
    enable: &IEC0,
    enable_mask: 1 << 20,
    priority: &IPC7,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC7,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};
static SPI1_RX: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 21,
    enable: &IEC0,
    enable_mask: 1 << 21,
    priority: &IPC7,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC7,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};
static SPI1_TX: InterruptDescriptor<'static, HwRegister> = InterruptDescriptor {
    flag: &IFS0,
    flag_mask: 1 << 22,
    enable: &IEC0,
    enable_mask: 1 << 22,
    priority: &IPC7,
    priority_mask: 0b111 << 2,
    priority_shift: 2,
    sub_priority: &IPC7,
    sub_priority_mask: 0b11,
    sub_priority_shift: 0,
};

static T1CON: HwRegister = unsafe { HwRegister::new(addr::T1CON) };

/// A 16-bit free-running counter plus its control register, the scheduler's
/// `HwTimer`. Grounded on the original's `HW_TIMER`/`HW_TIMER_CFG_REG` macros.
#[derive(Clone, Copy)]
struct SystemTimer {
    control: &'static HwRegister,
    counter: *const u16,
}

unsafe impl Sync for SystemTimer {}

impl HwTimer for SystemTimer {
    fn read(&self) -> u16 {
        unsafe { core::ptr::read_volatile(self.counter) }
    }

    fn configure(&self, config_word: u32, enable_bit: u32) {
        self.control.clear(enable_bit);
        self.control.set(config_word);
        self.control.set(enable_bit);
    }
}

static SYSTEM_TIMER: SystemTimer = SystemTimer {
    control: &T1CON,
    counter: addr::TMR1 as *const u16,
};

static mut SCHEDULER: Option<Scheduler<SystemTimer, SCHEDULER_EVENTS, SCHEDULER_TASKS>> = None;
static mut TIMERS: SoftTimers<4> = SoftTimers::new();
static mut HEARTBEAT_TIMER: Option<TimerRef> = None;

static mut UART_RX_BUF: [u8; 32] = [0; 32];
static mut UART_TX_BUF: [u8; 32] = [0; 32];
static mut UART: Option<AsyncSerial<'static, HwRegister, async_serial::HwDataRegister, UART_CHANNELS>> = None;
static mut UART_CHANNEL: Option<UartRef> = None;

static mut SPI_RX_BUF: [u8; 4 * 16] = [0; 4 * 16];
static mut SPI_TX_BUF: [u8; 4 * 16] = [0; 4 * 16];
static mut SPI: Option<SyncSerial<'static, HwRegister, sync_serial::HwDataRegister, SPI_CHANNELS>> = None;
static mut SPI_CHANNEL: Option<sync_serial::SyncRef> = None;

static mut CONSOLE: Option<PrintStream<ConsoleTransport>> = None;

struct ConsoleTransport;

impl StreamTransport for ConsoleTransport {
    fn open(&mut self) {}
    fn close(&mut self) {}

    fn transmit_raw(&self, buffer: &[u8]) -> usize {
        unsafe {
            match (UART.as_mut(), UART_CHANNEL) {
                (Some(uart), Some(channel)) => uart.transmit_raw(channel, buffer),
                _ => 0,
            }
        }
    }
}

struct Module {
    initialize: fn() -> bool,
}

static MODULES: &[Module] = &[
    Module { initialize: config_cpu_init },
    Module { initialize: scheduler_init },
    Module { initialize: timer_init },
    Module { initialize: uart_init },
    Module { initialize: spi_init },
];

/// Iterates the module table in order, stopping at the first failure. The
/// original walks a NULL-terminated array with a loop that never advances
/// its cursor past the first successful module, making it spin forever
/// instead of moving on; this iterates the slice instead.
fn initialize_modules() -> bool {
    for module in MODULES {
        if !(module.initialize)() {
            return false;
        }
    }
    true
}

fn config_cpu_init() -> bool {
    // Oscillator/PLL/flash-wait-state programming is board-specific and
    // out of scope for this illustration.
    regs::interrupt::enable_multivector_mode(&INTCON, INTCON_MVEC_BIT);
    true
}

fn scheduler_init() -> bool {
    let clock = SystemClock {
        peripheral_bus_hz: 8_000_000,
        prescaler: 8,
        timer_config_word: 0xA040,
        timer_enable_bit: 1 << 15,
    };
    unsafe {
        SCHEDULER = Some(Scheduler::init(SYSTEM_TIMER, clock));
    }
    true
}

fn timer_init() -> bool {
    unsafe {
        let Some(sched) = SCHEDULER.as_mut() else {
            return false;
        };
        if swtimer::init(sched, timer_tick_event).is_none() {
            return false;
        }
    }
    true
}

fn uart_init() -> bool {
    let hw = UartHardware {
        umode: &U1MODE,
        usta: &U1STA,
        ubrg: &U1BRG,
        rxreg: &U1RXREG,
        txreg: &U1TXREG,
        fault: &U1_FAULT,
        fault_priority: 5,
        rx_done: &U1_RX,
        rx_priority: 4,
        tx_done: &U1_TX,
        tx_priority: 3,
    };
    unsafe {
        let mut uart: AsyncSerial<'static, HwRegister, async_serial::HwDataRegister, UART_CHANNELS> =
            AsyncSerial::new([hw]);
        uart.init();
        let Some(channel) = uart.create(0, &mut UART_RX_BUF, &mut UART_TX_BUF, 32, 32) else {
            return false;
        };
        uart.configure(channel, UartConfig::HIGH_SPEED);
        uart.set_properties(channel, UartProperties::empty());
        uart.set_baudrate(channel, 8_000_000, 115_200);
        uart.enable(channel, UartEnable::RX | UartEnable::TX);
        UART = Some(uart);
        UART_CHANNEL = Some(channel);
    }
    true
}

fn spi_init() -> bool {
    let hw = SyncHardware {
        spicon: &SPI1CON,
        spicon2: &SPI1CON2,
        spistat: &SPI1STAT,
        spibrg: &SPI1BRG,
        spibuf: &SPI1BUF,
        fault: &SPI1_FAULT,
        fault_priority: 5,
        rx_done: &SPI1_RX,
        rx_priority: 4,
        tx_done: &SPI1_TX,
        tx_priority: 3,
    };
    unsafe {
        let mut spi: SyncSerial<'static, HwRegister, sync_serial::HwDataRegister, SPI_CHANNELS> =
            SyncSerial::new([hw]);
        spi.init();
        let Some(channel) = spi.create(0, &mut SPI_RX_BUF, &mut SPI_TX_BUF, 16, 16) else {
            return false;
        };
        spi.set_baudrate(channel, 8_000_000, 1_000_000);
        spi.enable(channel, SyncEnable::SS | SyncEnable::SDI | SyncEnable::SDO);
        SPI = Some(spi);
        SPI_CHANNEL = Some(channel);
    }
    true
}

/// Runs once module initialization has succeeded: wires the console onto
/// the UART channel and registers the application's own scheduler events
/// and round-robin tasks. The original leaves this stub empty.
fn scheduler_populate() {
    unsafe {
        let mut console = PrintStream::new(ConsoleTransport);
        console.open();
        CONSOLE = Some(console);

        HEARTBEAT_TIMER = TIMERS.create(TimerType::Recurring, Some(heartbeat_fired));
        if let Some(t) = HEARTBEAT_TIMER {
            TIMERS.start(t, 1, IntervalUnit::S);
        }

        if let Some(sched) = SCHEDULER.as_mut() {
            sched.create_robin_task(echo_spi_task);
            sched.create_robin_task(echo_uart_task);
        }
    }
}

fn timer_tick_event() {
    unsafe { TIMERS.execute() };
}

fn heartbeat_fired(_timer: TimerRef) {
    rtlog::klog!("heartbeat\n");
    unsafe {
        if let Some(console) = CONSOLE.as_mut() {
            use core::fmt::Write;
            let _ = write!(console, "tick\n");
        }
    }
}

/// Round-robin task: drains any bytes the UART has received and echoes
/// them straight back out, one pass at a time.
fn echo_uart_task() {
    unsafe {
        let (Some(uart), Some(channel)) = (UART.as_mut(), UART_CHANNEL) else {
            return;
        };
        if !uart.rx_available(channel) {
            return;
        }
        let mut byte = [0u8; 1];
        if uart.receive_raw(channel, &mut byte) == 1 {
            uart.transmit_raw(channel, &byte);
        }
    }
}

/// Round-robin task: drains any words the SPI channel has received and
/// logs how many arrived this pass.
fn echo_spi_task() {
    unsafe {
        let (Some(spi), Some(channel)) = (SPI.as_mut(), SPI_CHANNEL) else {
            return;
        };
        if !spi.rx_available(channel) {
            return;
        }
        let mut word = [0u32; 1];
        if spi.receive(channel, &mut word) == 1 {
            rtlog::klog!("spi word={}\n", word[0]);
        }
    }
}

fn halt_processor() -> ! {
    loop {
        unsafe { riscv::asm::nop() };
    }
}

#[entry]
fn main() -> ! {
    if !initialize_modules() {
        rtlog::klog!("module initialization failed\n");
        halt_processor();
    }

    scheduler_populate();

    regs::interrupt::global_enable();

    loop {
        unsafe {
            if let Some(sched) = SCHEDULER.as_mut() {
                sched.execute();
            }
        }
    }
}

/// Single ISR entry point for the UART channel. A real board's vector
/// table would route its UART1 vector here; wiring that table is
/// board-specific and out of scope for this illustration.
#[no_mangle]
pub extern "C" fn uart1_isr() {
    unsafe {
        if let Some(uart) = UART.as_mut() {
            uart.handle_interrupt(0);
        }
    }
}

/// Single ISR entry point for the SPI channel, analogous to `uart1_isr`.
#[no_mangle]
pub extern "C" fn spi1_isr() {
    unsafe {
        if let Some(spi) = SPI.as_mut() {
            spi.handle_interrupt(0);
        }
    }
}
