//! Burst (integral half-cycle) firing engine.
//!
//! Instead of chopping each half-cycle, burst control passes or blocks
//! whole half-cycles: over a rolling window of [`BURST_WINDOW`] half-cycles
//! a dimmer conducts `round(duty * BURST_WINDOW)` of them. Meant for
//! zero-cross SSRs and slow thermal loads, where phase chopping is
//! unnecessary EMI.
//!
//! The scheduling rule must keep the current draw symmetric between
//! positive and negative half-cycles, otherwise the load sees a DC
//! component (which saturates upstream transformers). Here whole mains
//! cycles (pairs of half-cycles) are spread across the window with an
//! integer Bresenham walk; an odd target leaves one unpaired half-cycle,
//! which alternates between the first and second half of its cycle on
//! successive windows so the DC component averages out to zero.
//!
//! One periodic alarm per semi-period drives every registered dimmer; the
//! zero-cross callback only re-syncs the counter to the grid. The per-slot
//! on-count target is an integer computed in foreground `apply()`, so the
//! ISR is integer-only.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::{debug, info};

use crate::error::{DimmerError, Result};
use crate::hw::fire_timer::{FireTimer, TimerCell};
use crate::hw::gpio;
use crate::hw::spinlock::IsrSpinlock;

use super::firing::MAX_DIMMERS;
use super::SlotId;

/// Half-cycles per scheduling window (200 ms at 50 Hz).
pub const BURST_WINDOW: u8 = 20;

const PAIRS: u8 = BURST_WINDOW / 2;

#[derive(Clone, Copy)]
struct BurstSlot {
    pin: i32,
    /// Target on-half-cycles per window, `0..=BURST_WINDOW`.
    target: u8,
    /// Position within the current window, `0..BURST_WINDOW`.
    half_index: u8,
    /// Which half of its cycle the unpaired half-cycle lands on; toggles
    /// every completed window.
    window_flip: bool,
    active: bool,
}

const EMPTY_SLOT: BurstSlot = BurstSlot {
    pin: -1,
    target: 0,
    half_index: 0,
    window_flip: false,
    active: false,
};

struct Registry {
    slots: [BurstSlot; MAX_DIMMERS],
    active: usize,
}

/// Whether a whole mains cycle (pair `p`) conducts, spreading `pairs_on`
/// cycles evenly across the window.
fn pair_on(pairs_on: u8, p: u8) -> bool {
    let hi = (p as u16 + 1) * pairs_on as u16 / PAIRS as u16;
    let lo = p as u16 * pairs_on as u16 / PAIRS as u16;
    hi > lo
}

fn first_off_pair(pairs_on: u8) -> u8 {
    (0..PAIRS).find(|&p| !pair_on(pairs_on, p)).unwrap_or(0)
}

/// Conduction decision for half-cycle `half_index` of a window.
fn slot_conducts(target: u8, half_index: u8, window_flip: bool) -> bool {
    let pairs_on = target / 2;
    let p = half_index / 2;
    if pair_on(pairs_on, p) {
        return true;
    }
    if target % 2 == 1 && p == first_off_pair(pairs_on) {
        // The unpaired half-cycle: first half on even windows, second half
        // on odd windows (or vice versa), so its DC contribution cancels.
        let first_half = half_index % 2 == 0;
        return first_half != window_flip;
    }
    false
}

/// Burst firing engine. One per application; dimmers register with it and
/// it owns the periodic fire timer while any dimmer is registered.
pub struct BurstEngine {
    registry: IsrSpinlock<Registry>,
    timer: TimerCell,
    semi_period_us: AtomicU16,
    /// Period the alarm is currently armed with; 0 = unarmed.
    alarm_period: AtomicU16,
    in_alarm: AtomicBool,
}

impl BurstEngine {
    pub fn new() -> Self {
        Self {
            registry: IsrSpinlock::new(Registry {
                slots: [EMPTY_SLOT; MAX_DIMMERS],
                active: 0,
            }),
            timer: TimerCell::new(),
            semi_period_us: AtomicU16::new(0),
            alarm_period: AtomicU16::new(0),
            in_alarm: AtomicBool::new(false),
        }
    }

    /// Set the mains semi-period in microseconds and re-arm the half-cycle
    /// alarm accordingly. Zero disables firing.
    pub fn set_semi_period(&self, semi_period_us: u16) {
        self.semi_period_us.store(semi_period_us, Ordering::Relaxed);
        self.sync_alarm();
    }

    pub fn semi_period(&self) -> u16 {
        self.semi_period_us.load(Ordering::Relaxed)
    }

    pub fn registered(&self) -> usize {
        self.registry.lock().active
    }

    pub fn fire_timer_active(&self) -> bool {
        self.timer.get().is_some()
    }

    pub(crate) fn register(&'static self, pin: i32) -> Result<SlotId> {
        if self.timer.get().is_none() {
            info!("Starting burst fire timer");
            let timer = FireTimer::create(Self::alarm_isr, self as *const Self as *mut c_void)?;
            self.timer.set(timer);
            self.alarm_period.store(0, Ordering::Relaxed);
        }

        let id = {
            let mut registry = self.registry.lock();
            let Some(index) = registry.slots.iter().position(|s| !s.active) else {
                drop(registry);
                self.teardown_if_empty();
                return Err(DimmerError::RegistryFull);
            };
            registry.slots[index] = BurstSlot {
                pin,
                active: true,
                ..EMPTY_SLOT
            };
            registry.active += 1;
            SlotId(index)
        };
        debug!("Registered burst dimmer on pin {pin} (slot {})", id.0);
        self.sync_alarm();
        Ok(id)
    }

    pub(crate) fn unregister(&self, id: SlotId) {
        {
            let mut registry = self.registry.lock();
            let slot = &mut registry.slots[id.0];
            if !slot.active {
                return;
            }
            debug!("Unregistered burst dimmer on pin {} (slot {})", slot.pin, id.0);
            *slot = EMPTY_SLOT;
            registry.active -= 1;
        }
        self.teardown_if_empty();
    }

    /// Latch a new on-count target (half-cycles per window). Foreground
    /// only; picked up at the next half-cycle alarm.
    pub(crate) fn set_target(&self, id: SlotId, target: u8) {
        let mut registry = self.registry.lock();
        let slot = &mut registry.slots[id.0];
        if slot.active {
            slot.target = target.min(BURST_WINDOW);
        }
    }

    /// (Re)arm the periodic half-cycle alarm to match the semi-period.
    pub(crate) fn sync_alarm(&self) {
        let Some(timer) = self.timer.get() else {
            self.alarm_period.store(0, Ordering::Relaxed);
            return;
        };
        let semi = self.semi_period_us.load(Ordering::Relaxed);
        let armed = self.alarm_period.load(Ordering::Relaxed);
        if semi == 0 && armed != 0 {
            debug!("Disarming burst half-cycle alarm");
            timer.disarm();
            self.alarm_period.store(0, Ordering::Relaxed);
        } else if semi > 0 && armed != semi {
            debug!("Arming burst half-cycle alarm every {semi} us");
            timer.set_count(0);
            timer.arm_periodic(semi as u64);
            self.alarm_period.store(semi, Ordering::Relaxed);
        }
    }

    fn teardown_if_empty(&self) {
        let empty = self.registry.lock().active == 0;
        if empty {
            if let Some(timer) = self.timer.take() {
                info!("Stopping burst fire timer");
                timer.destroy();
            }
            self.alarm_period.store(0, Ordering::Relaxed);
        }
    }

    /// Zero-cross upcall, C-ABI: re-sync the half-cycle alarm to the grid.
    /// Runs in ISR context.
    ///
    /// # Safety
    ///
    /// `ctx` must point at a live `BurstEngine`.
    pub unsafe extern "C" fn on_zero_cross(_delay_until_zero_us: i16, ctx: *mut c_void) {
        let engine = unsafe { &*(ctx as *const BurstEngine) };
        engine.handle_zero_cross();
    }

    /// Zero-cross handler body: restart the counter so the periodic alarm
    /// stays phase-locked to the grid.
    pub fn handle_zero_cross(&self) {
        if let Some(timer) = self.timer.get() {
            timer.set_count(0);
        }
    }

    fn alarm_isr(ctx: *mut c_void) -> bool {
        // SAFETY: ctx was set to the engine address at timer creation and
        // the timer is destroyed before the engine could go away.
        let engine = unsafe { &*(ctx as *const BurstEngine) };
        engine.handle_alarm();
        false
    }

    /// Half-cycle alarm body: decide conduction for every dimmer and step
    /// its window position.
    fn handle_alarm(&self) {
        if self.in_alarm.swap(true, Ordering::Relaxed) {
            return;
        }

        {
            let mut registry = self.registry.lock();
            for slot in registry.slots.iter_mut().filter(|s| s.active) {
                let on = match slot.target {
                    0 => false,
                    t if t >= BURST_WINDOW => true,
                    t => slot_conducts(t, slot.half_index, slot.window_flip),
                };
                gpio::write_isr(slot.pin, on);

                slot.half_index += 1;
                if slot.half_index >= BURST_WINDOW {
                    slot.half_index = 0;
                    slot.window_flip = !slot.window_flip;
                }
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

impl Default for BurstEngine {
    fn default() -> Self {
        Self::new()
    }
}
