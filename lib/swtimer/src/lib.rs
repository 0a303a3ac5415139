// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

//! Software timer pool, ticked by one recurring scheduler event. Grounded
//! on `kernel/utils/timer/timer.c`/`timer.h`.
//!
//! Unlike the event/task pools in `scheduler`, this pool never re-sorts its
//! entries, so a [`TimerRef`] is simply the timer's fixed slot index — no
//! identifier-survives-sort bookkeeping is needed here.
//!
//! This crate reuses [`scheduler::IntervalUnit`] rather than declaring a
//! second, identical µs/ms/s enum: the original keeps `TimerUnit` and
//! `SchedulerIntervalUnit` as separate types purely because they live in
//! separate compilation units with no shared header; that constraint does
//! not apply to a Cargo workspace.

pub use scheduler::IntervalUnit;
use scheduler::{EventRef, HwTimer, Priority, Scheduler, SchedulerHandle};

/// One recurring scheduler tick drives every timer in the pool, every
/// `TIMER_TICK_INTERVAL_US` microseconds.
pub const TIMER_TICK_INTERVAL_US: u32 = 500;

/// A timer's disposition on timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerType {
    /// Reloads and fires again every `interval`.
    Recurring,
    /// Fires once, then suspends itself.
    OneShot,
    /// Never invokes a handle; only sets the sticky `timed_out` flag.
    Countdown,
}

/// Invoked with the timer that actually fired. The original's `timer_execute`
/// instead passes its own final loop pointer — a bug this port does not
/// reproduce.
pub type TimerCallback = fn(TimerRef);

/// Opaque, stable reference to a timer: a fixed slot index, since this pool
/// never reorders its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRef(usize);

#[derive(Clone, Copy)]
struct Timer {
    interval: u32,
    ticks: u32,
    handle: Option<TimerCallback>,
    kind: TimerType,
    assigned: bool,
    suspended: bool,
    timed_out: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Timer {
            interval: 0,
            ticks: 0,
            handle: None,
            kind: TimerType::Countdown,
            assigned: false,
            suspended: true,
            timed_out: false,
        }
    }
}

/// Fixed pool of `N` software timers.
pub struct SoftTimers<const N: usize> {
    timers: [Timer; N],
}

impl<const N: usize> SoftTimers<N> {
    pub const fn new() -> Self {
        SoftTimers {
            timers: [Timer {
                interval: 0,
                ticks: 0,
                handle: None,
                kind: TimerType::Countdown,
                assigned: false,
                suspended: true,
                timed_out: false,
            }; N],
        }
    }

    /// Claims a free slot, suspended, with no interval set yet.
    pub fn create(&mut self, kind: TimerType, handle: Option<TimerCallback>) -> Option<TimerRef> {
        let slot = self.timers.iter().position(|t| !t.assigned)?;
        let timer = &mut self.timers[slot];
        timer.interval = 0;
        timer.ticks = 0;
        timer.handle = handle;
        timer.kind = kind;
        timer.suspended = true;
        timer.timed_out = false;
        timer.assigned = true;
        Some(TimerRef(slot))
    }

    /// Returns the timer to the pool.
    pub fn invalidate(&mut self, timer: TimerRef) {
        if let Some(t) = self.timers.get_mut(timer.0) {
            t.assigned = false;
        }
    }

    /// Sets the time-out interval without changing suspension state.
    pub fn set_time(&mut self, timer: TimerRef, time: u32, unit: IntervalUnit) {
        if let Some(t) = self.timers.get_mut(timer.0) {
            let ticks = calc_ticks(time, unit);
            t.interval = ticks;
            t.ticks = ticks;
        }
    }

    /// Sets the interval and unsuspends, clearing any sticky time-out.
    pub fn start(&mut self, timer: TimerRef, time: u32, unit: IntervalUnit) {
        if let Some(t) = self.timers.get_mut(timer.0) {
            let ticks = calc_ticks(time, unit);
            t.interval = ticks;
            t.ticks = ticks;
            t.timed_out = false;
            t.suspended = false;
        }
    }

    pub fn stop(&mut self, timer: TimerRef) {
        if let Some(t) = self.timers.get_mut(timer.0) {
            t.suspended = true;
        }
    }

    /// Reloads the last interval and unsuspends, clearing any sticky
    /// time-out.
    pub fn restart(&mut self, timer: TimerRef) {
        if let Some(t) = self.timers.get_mut(timer.0) {
            t.ticks = t.interval;
            t.timed_out = false;
            t.suspended = false;
        }
    }

    pub fn timed_out(&self, timer: TimerRef) -> bool {
        self.timers
            .get(timer.0)
            .is_some_and(|t| t.assigned && t.timed_out)
    }

    pub fn is_valid(&self, timer: TimerRef) -> bool {
        self.timers.get(timer.0).is_some_and(|t| t.assigned)
    }

    /// One pass over the whole pool, called every `TIMER_TICK_INTERVAL_US`.
    /// At most one timer's handle runs per call.
    pub fn execute(&mut self) {
        let mut fired: Option<usize> = None;

        for (i, timer) in self.timers.iter_mut().enumerate() {
            if !timer.assigned || timer.suspended {
                continue;
            }

            if timer.ticks > 0 {
                timer.ticks -= 1;
                timer.timed_out = timer.ticks == 0;
            } else {
                timer.timed_out = true;
            }

            if !timer.timed_out {
                continue;
            }

            match timer.kind {
                TimerType::Recurring => {
                    if fired.is_none() {
                        timer.timed_out = false;
                        timer.ticks = timer.interval;
                        fired = Some(i);
                    }
                }
                TimerType::OneShot => {
                    if fired.is_none() {
                        timer.suspended = true;
                        fired = Some(i);
                    }
                }
                TimerType::Countdown => {
                    timer.suspended = true;
                }
            }
        }

        if let Some(i) = fired {
            if let Some(handle) = self.timers[i].handle {
                handle(TimerRef(i));
            }
        }
    }
}

impl<const N: usize> Default for SoftTimers<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn calc_ticks(time: u32, unit: IntervalUnit) -> u32 {
    match unit {
        IntervalUnit::Us => time / TIMER_TICK_INTERVAL_US,
        IntervalUnit::Ms => (time as u64 * 1000 / TIMER_TICK_INTERVAL_US as u64) as u32,
        IntervalUnit::S => {
            // Clamped to 4096s (not widened/saturated like the scheduler's
            // own seconds path) per the original's explicit 12-bit limit.
            let clamped = time.min(4096);
            (clamped as u64 * 1_000_000 / TIMER_TICK_INTERVAL_US as u64) as u32
        }
    }
}

/// Registers the recurring `TIMER_TICK_INTERVAL_US` scheduler event whose
/// handle drives a [`SoftTimers`] pool's [`SoftTimers::execute`]. The pool
/// itself is owned by the caller (typically a single static instance,
/// analogous to the original's file-scope `timerPool`); `handle` is whatever
/// zero-argument wrapper the caller wires up to reach that static — the
/// scheduler's `SchedulerHandle` carries no captured state, exactly like the
/// original's `timer_execute`.
pub fn init<T: HwTimer, const EVENTS: usize, const TASKS: usize>(
    sched: &mut Scheduler<T, EVENTS, TASKS>,
    handle: SchedulerHandle,
) -> Option<EventRef> {
    sched.create_event(handle, TIMER_TICK_INTERVAL_US as u16, IntervalUnit::Us, Priority::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once_then_suspends() {
        let mut pool: SoftTimers<4> = SoftTimers::new();
        let t = pool.create(TimerType::OneShot, None).unwrap();
        pool.start(t, 2, IntervalUnit::Us);
        // interval in raw ticks here is whatever calc_ticks gives for 2us;
        // TIMER_TICK_INTERVAL_US is 500, so 2us rounds down to 0 ticks,
        // meaning it fires on the very first execute() pass.
        pool.execute();
        assert!(pool.timed_out(t));
    }

    #[test]
    fn countdown_never_invokes_handle_and_latches() {
        static CALLS: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
        fn bump(_: TimerRef) {
            CALLS.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }

        let mut pool: SoftTimers<4> = SoftTimers::new();
        let t = pool.create(TimerType::Countdown, Some(bump)).unwrap();
        pool.start(t, 2 * TIMER_TICK_INTERVAL_US, IntervalUnit::Us);

        pool.execute();
        assert!(!pool.timed_out(t));
        pool.execute();
        assert!(pool.timed_out(t));
        pool.execute(); // stays latched, no further decrement once suspended
        assert!(pool.timed_out(t));
        assert_eq!(CALLS.load(core::sync::atomic::Ordering::Relaxed), 0);

        pool.restart(t);
        assert!(!pool.timed_out(t));
    }

    #[test]
    fn recurring_fires_every_interval_ticks() {
        static CALLS: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
        fn bump(_: TimerRef) {
            CALLS.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
        CALLS.store(0, core::sync::atomic::Ordering::Relaxed);

        let mut pool: SoftTimers<4> = SoftTimers::new();
        let t = pool.create(TimerType::Recurring, Some(bump)).unwrap();
        pool.start(t, 2 * TIMER_TICK_INTERVAL_US, IntervalUnit::Us); // 2 ticks

        pool.execute(); // 2 -> 1
        assert_eq!(CALLS.load(core::sync::atomic::Ordering::Relaxed), 0);
        pool.execute(); // 1 -> 0, fires, reloads to 2
        assert_eq!(CALLS.load(core::sync::atomic::Ordering::Relaxed), 1);
        pool.execute();
        pool.execute();
        assert_eq!(CALLS.load(core::sync::atomic::Ordering::Relaxed), 2);
    }

    #[test]
    fn only_one_handle_runs_per_pass() {
        static CALLS_A: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
        static CALLS_B: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
        fn bump_a(_: TimerRef) {
            CALLS_A.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
        fn bump_b(_: TimerRef) {
            CALLS_B.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
        CALLS_A.store(0, core::sync::atomic::Ordering::Relaxed);
        CALLS_B.store(0, core::sync::atomic::Ordering::Relaxed);

        let mut pool: SoftTimers<4> = SoftTimers::new();
        let a = pool.create(TimerType::Recurring, Some(bump_a)).unwrap();
        let b = pool.create(TimerType::Recurring, Some(bump_b)).unwrap();
        // A 2-tick interval makes both timers hit zero on the same pass
        // without `a` immediately re-qualifying on the pass right after it
        // wins, which is what a 1-tick interval (or 0, as before) collapses
        // into: `a` always occupies slot 0 and would re-time-out on every
        // following pass too, starving `b` forever instead of deferring it
        // by exactly one pass.
        pool.start(a, 2 * TIMER_TICK_INTERVAL_US, IntervalUnit::Us);
        pool.start(b, 2 * TIMER_TICK_INTERVAL_US, IntervalUnit::Us);

        pool.execute(); // 2 -> 1 for both, neither times out yet
        assert_eq!(CALLS_A.load(core::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(CALLS_B.load(core::sync::atomic::Ordering::Relaxed), 0);

        pool.execute(); // both hit zero; a wins the tie and reloads to 2
        assert_eq!(CALLS_A.load(core::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(CALLS_B.load(core::sync::atomic::Ordering::Relaxed), 0);

        // the deferred timer stays timed-out and fires on the very next
        // pass, since a's reloaded ticks (2 -> 1) don't collide again yet
        pool.execute();
        assert_eq!(CALLS_A.load(core::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(CALLS_B.load(core::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn invalidate_returns_slot_to_pool() {
        let mut pool: SoftTimers<1> = SoftTimers::new();
        let a = pool.create(TimerType::Countdown, None).unwrap();
        assert!(pool.create(TimerType::Countdown, None).is_none());
        pool.invalidate(a);
        assert!(!pool.is_valid(a));
        assert!(pool.create(TimerType::Countdown, None).is_some());
    }

    #[test]
    fn seconds_are_clamped_to_4096() {
        let unclamped = calc_ticks(4096, IntervalUnit::S);
        let over = calc_ticks(u32::MAX, IntervalUnit::S);
        assert_eq!(unclamped, over);
    }
}
