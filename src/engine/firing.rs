//! Phase-control firing engine.
//!
//! Once per mains half-cycle the engine must, for every registered dimmer:
//! drop the gate low at the zero crossing, raise it high again after that
//! dimmer's firing delay, and leave it high until the TRIAC commutates off
//! on its own at the current zero.
//!
//! Two ISRs cooperate around one shared slot table:
//!
//! - the **zero-cross handler**, driven by an external pulse analyzer that
//!   reports how many microseconds remain until the true zero crossing;
//! - the **alarm handler** of a dedicated 1 MHz one-shot timer, which
//!   raises gates whose delay has elapsed and re-arms itself for the next
//!   pending one.
//!
//! The slot table is fixed-capacity and guarded by a single interrupt-safe
//! spinlock; neither ISR allocates, blocks or touches floating point.
//! Firing delays are derived in foreground `apply()` and only *latched*
//! here.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use log::{debug, info};

use crate::error::{DimmerError, Result};
use crate::hw::fire_timer::{FireTimer, TimerCell};
use crate::hw::gpio;
use crate::hw::spinlock::IsrSpinlock;

use super::SlotId;

/// Maximum number of dimmers one engine can drive.
pub const MAX_DIMMERS: usize = 8;

/// Hardware floor for the firing delay. Below this the gate voltage has not
/// risen far enough to source the ~30 mA gate current, so the TRIAC would
/// not latch:
/// `delay_us = asin((gate_resistor * gate_current) / grid_volt_max) / pi * period_us`
/// `delay_us = asin((330 * 0.03) / 325) / pi * 10000 = 97us`
pub const PHASE_DELAY_MIN_US: u16 = 90;

/// Sentinel delay: do not fire this half-cycle.
pub(crate) const DELAY_NONE: u16 = u16::MAX;

#[derive(Clone, Copy)]
struct Slot {
    pin: i32,
    /// Latched firing delay in us; `DELAY_NONE` = off, 0 = full on.
    delay: u16,
    /// ISR scratch: remaining alarm for this half-cycle, `DELAY_NONE` once
    /// fired or when the dimmer is off.
    alarm_count: u16,
    active: bool,
}

const EMPTY_SLOT: Slot = Slot {
    pin: -1,
    delay: DELAY_NONE,
    alarm_count: DELAY_NONE,
    active: false,
};

struct Registry {
    slots: [Slot; MAX_DIMMERS],
    active: usize,
}

/// What the zero-cross handler should do once the slot walk is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZcAlignment {
    /// The true zero crossing already passed but the first firing is still
    /// ahead: set the counter past zero and fire due dimmers immediately.
    FireNow { count: u64 },
    /// Too late for the first firing; a late pulse flickers, so skip the
    /// whole half-cycle.
    Skip,
    /// Normal case: pre-wind the counter below zero so it crosses zero at
    /// the true zero crossing, then wait for the alarm.
    Arm { count: u64 },
}

/// Pure alignment decision, extracted from the handler so the timing-miss
/// branches are testable (on the host the ISR body itself takes zero
/// simulated time).
fn zc_alignment(elapsed_in_isr: u64, delay_until_zero: u64, next_alarm: u16) -> ZcAlignment {
    if elapsed_in_isr >= delay_until_zero {
        let past_zero = elapsed_in_isr - delay_until_zero;
        if past_zero <= next_alarm as u64 {
            ZcAlignment::FireNow { count: past_zero }
        } else {
            ZcAlignment::Skip
        }
    } else {
        // Counts up through zero exactly at the true zero crossing.
        ZcAlignment::Arm {
            count: elapsed_in_isr.wrapping_sub(delay_until_zero),
        }
    }
}

/// Phase-control firing engine. One per application; dimmers register with
/// it and it owns the fire timer while any dimmer is registered.
pub struct FiringEngine {
    registry: IsrSpinlock<Registry>,
    timer: TimerCell,
    semi_period_us: AtomicU16,
    /// Re-entry guard for the alarm handler. The platform serializes the
    /// alarm ISR with itself; the atomic only makes the flag well-defined
    /// across contexts.
    in_alarm: AtomicBool,
    missed_half_cycles: AtomicU32,
}

impl FiringEngine {
    pub fn new() -> Self {
        Self {
            registry: IsrSpinlock::new(Registry {
                slots: [EMPTY_SLOT; MAX_DIMMERS],
                active: 0,
            }),
            timer: TimerCell::new(),
            semi_period_us: AtomicU16::new(0),
            in_alarm: AtomicBool::new(false),
            missed_half_cycles: AtomicU32::new(0),
        }
    }

    /// Set the mains semi-period in microseconds (10000 at 50 Hz, 8333 at
    /// 60 Hz). Zero means unknown; no dimmer fires until it is set.
    pub fn set_semi_period(&self, semi_period_us: u16) {
        self.semi_period_us.store(semi_period_us, Ordering::Relaxed);
    }

    pub fn semi_period(&self) -> u16 {
        self.semi_period_us.load(Ordering::Relaxed)
    }

    /// Half-cycles skipped because the zero-cross handler ran too late to
    /// fire on time.
    pub fn missed_half_cycles(&self) -> u32 {
        self.missed_half_cycles.load(Ordering::Relaxed)
    }

    /// Number of registered dimmers.
    pub fn registered(&self) -> usize {
        self.registry.lock().active
    }

    /// Whether the fire timer currently exists (it does exactly while at
    /// least one dimmer is registered).
    pub fn fire_timer_active(&self) -> bool {
        self.timer.get().is_some()
    }

    pub(crate) fn register(&'static self, pin: i32) -> Result<SlotId> {
        if self.timer.get().is_none() {
            info!("Starting dimmer fire timer");
            let timer = FireTimer::create(Self::alarm_isr, self as *const Self as *mut c_void)?;
            self.timer.set(timer);
        }

        let id = {
            let mut registry = self.registry.lock();
            let Some(index) = registry.slots.iter().position(|s| !s.active) else {
                drop(registry);
                self.teardown_if_empty();
                return Err(DimmerError::RegistryFull);
            };
            registry.slots[index] = Slot {
                pin,
                delay: DELAY_NONE,
                alarm_count: DELAY_NONE,
                active: true,
            };
            registry.active += 1;
            SlotId(index)
        };
        debug!("Registered dimmer on pin {pin} (slot {})", id.0);
        Ok(id)
    }

    pub(crate) fn unregister(&self, id: SlotId) {
        {
            let mut registry = self.registry.lock();
            let slot = &mut registry.slots[id.0];
            if !slot.active {
                return;
            }
            debug!("Unregistered dimmer on pin {} (slot {})", slot.pin, id.0);
            *slot = EMPTY_SLOT;
            registry.active -= 1;
        }
        self.teardown_if_empty();
    }

    /// Latch a new firing delay for the next half-cycle. Foreground only;
    /// visible to the next zero-cross handler, not necessarily the current
    /// one.
    pub(crate) fn set_delay(&self, id: SlotId, delay_us: u16) {
        let mut registry = self.registry.lock();
        let slot = &mut registry.slots[id.0];
        if slot.active {
            slot.delay = delay_us;
        }
    }

    fn teardown_if_empty(&self) {
        let empty = self.registry.lock().active == 0;
        if empty {
            if let Some(timer) = self.timer.take() {
                info!("Stopping dimmer fire timer");
                timer.destroy();
            }
        }
    }

    /// Zero-cross upcall, C-ABI. Register with the pulse analyzer with
    /// `ctx` pointing at the engine. Runs in ISR context.
    ///
    /// # Safety
    ///
    /// `ctx` must point at a live `FiringEngine`.
    pub unsafe extern "C" fn on_zero_cross(delay_until_zero_us: i16, ctx: *mut c_void) {
        let engine = unsafe { &*(ctx as *const FiringEngine) };
        engine.handle_zero_cross(delay_until_zero_us.max(0) as u16);
    }

    /// Zero-cross handler body. `delay_until_zero_us` is how far in the
    /// future the true zero crossing lies, as measured by the external
    /// pulse analyzer (typically 200-550 us depending on the detector).
    pub fn handle_zero_cross(&self, delay_until_zero_us: u16) {
        let Some(timer) = self.timer.get() else {
            return;
        };

        // t = 0 at handler entry.
        timer.set_count(0);

        let mut next_alarm = DELAY_NONE;
        {
            let mut registry = self.registry.lock();
            for slot in registry.slots.iter_mut().filter(|s| s.active) {
                if slot.delay != 0 {
                    // Off (sentinel) or delayed: gate low at the zero cross.
                    gpio::write_isr(slot.pin, false);
                    slot.alarm_count = if slot.delay == DELAY_NONE {
                        DELAY_NONE
                    } else {
                        slot.delay.max(PHASE_DELAY_MIN_US)
                    };
                    if slot.alarm_count < next_alarm {
                        next_alarm = slot.alarm_count;
                    }
                } else {
                    // Full on: keep the gate high through the half-cycle.
                    gpio::write_isr(slot.pin, true);
                    slot.alarm_count = DELAY_NONE;
                }
            }
        }

        // Time spent walking the slots and waiting for the lock.
        let elapsed_in_isr = timer.count();

        match zc_alignment(elapsed_in_isr, delay_until_zero_us as u64, next_alarm) {
            ZcAlignment::FireNow { count } => {
                timer.set_count(count);
                self.handle_alarm();
            }
            ZcAlignment::Skip => {
                self.missed_half_cycles.fetch_add(1, Ordering::Relaxed);
            }
            ZcAlignment::Arm { count } => {
                timer.set_count(count);
                timer.arm_oneshot(next_alarm as u64);
            }
        }
    }

    /// Fire-timer alarm trampoline. Runs in ISR context.
    fn alarm_isr(ctx: *mut c_void) -> bool {
        // SAFETY: ctx was set to the engine address at timer creation and
        // the timer is destroyed before the engine could go away.
        let engine = unsafe { &*(ctx as *const FiringEngine) };
        engine.handle_alarm();
        false
    }

    /// Alarm handler body: raise every gate whose delay has elapsed, then
    /// re-arm for the earliest remaining one. Loops until quiescent so
    /// near-simultaneous dimmers fire without another ISR round-trip.
    fn handle_alarm(&self) {
        if self.in_alarm.swap(true, Ordering::Relaxed) {
            // A pathological overrun re-entered the ISR; drop the nested
            // invocation.
            return;
        }

        if let Some(timer) = self.timer.get() {
            let mut now = timer.count();
            loop {
                let mut next_alarm = DELAY_NONE;
                {
                    let mut registry = self.registry.lock();
                    for slot in registry
                        .slots
                        .iter_mut()
                        .filter(|s| s.active && s.alarm_count != DELAY_NONE)
                    {
                        if slot.alarm_count as u64 <= now {
                            gpio::write_isr(slot.pin, true);
                            slot.alarm_count = DELAY_NONE;
                        } else if slot.alarm_count < next_alarm {
                            next_alarm = slot.alarm_count;
                        }
                    }
                }

                now = timer.count();
                if next_alarm != DELAY_NONE && next_alarm as u64 <= now {
                    // Another dimmer came due while we were walking.
                    continue;
                }
                if next_alarm != DELAY_NONE {
                    timer.arm_oneshot(next_alarm as u64);
                }
                break;
            }
        }

        self.in_alarm.store(false, Ordering::Relaxed);
    }

    /// Host-simulation only: advance the virtual fire timer, dispatching
    /// due alarms.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_advance(&self, us: u64) {
        if let Some(timer) = self.timer.get() {
            timer.advance(us);
        }
    }
}

impl Default for FiringEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_normal_case_prewinds_counter() {
        // 5us spent in the handler, zero cross 300us ahead.
        match zc_alignment(5, 300, 4000) {
            ZcAlignment::Arm { count } => assert_eq!(count, 5u64.wrapping_sub(300)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn alignment_late_but_catchable_fires_now() {
        // Handler finished 100us after the zero cross, first firing at 4000us.
        match zc_alignment(400, 300, 4000) {
            ZcAlignment::FireNow { count } => assert_eq!(count, 100),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn alignment_boundary_is_still_catchable() {
        assert_eq!(
            zc_alignment(4300, 300, 4000),
            ZcAlignment::FireNow { count: 4000 }
        );
    }

    #[test]
    fn alignment_too_late_skips_half_cycle() {
        assert_eq!(zc_alignment(4301, 300, 4000), ZcAlignment::Skip);
    }

    #[test]
    fn alignment_with_no_pending_dimmer_still_arms() {
        match zc_alignment(5, 300, DELAY_NONE) {
            ZcAlignment::Arm { .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
