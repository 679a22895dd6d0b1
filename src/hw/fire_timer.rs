//! One-shot/periodic microsecond fire timer.
//!
//! On ESP-IDF this wraps a 1 MHz `gptimer` with an alarm callback running in
//! ISR context. On the host it is a virtual counter: tests call `advance()`
//! to move simulated time forward and any due alarm dispatches the same
//! callback, so the firing engine's edge timing is observable cycle by
//! cycle without hardware.
//!
//! `FireTimer` is a copyable handle; ownership lives in a [`TimerCell`]
//! (engines create the timer with the first registered dimmer and tear it
//! down with the last one).

use core::ffi::c_void;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::error::Result;

/// Alarm callback. Runs in ISR context on target: no allocation, no
/// blocking, no floating point. Returns whether a higher-priority task
/// was woken (always false for the engines in this crate).
pub type AlarmHandler = fn(ctx: *mut c_void) -> bool;

/// Copyable handle to a running fire timer.
#[derive(Clone, Copy)]
pub struct FireTimer(*mut c_void);

/// Engine-owned cell holding the current timer handle, readable from ISR
/// context without locking.
pub struct TimerCell(AtomicPtr<c_void>);

// SAFETY: the cell only stores a pointer; all operations on the pointee are
// either atomic (host) or thread-safe ESP-IDF driver calls (target).
unsafe impl Send for TimerCell {}
unsafe impl Sync for TimerCell {}

impl TimerCell {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(core::ptr::null_mut()))
    }

    pub fn get(&self) -> Option<FireTimer> {
        let ptr = self.0.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            Some(FireTimer(ptr))
        }
    }

    pub fn set(&self, timer: FireTimer) {
        self.0.store(timer.0, Ordering::Release);
    }

    pub fn take(&self) -> Option<FireTimer> {
        let ptr = self.0.swap(core::ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            None
        } else {
            Some(FireTimer(ptr))
        }
    }
}

impl Default for TimerCell {
    fn default() -> Self {
        Self::new()
    }
}

// ── ESP-IDF gptimer ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod imp {
    use super::*;
    use crate::error::DimmerError;
    use esp_idf_svc::sys::*;

    pub(super) struct Inner {
        pub handle: gptimer_handle_t,
        pub handler: AlarmHandler,
        pub ctx: *mut c_void,
    }

    unsafe extern "C" fn on_alarm(
        _timer: gptimer_handle_t,
        _event: *const gptimer_alarm_event_data_t,
        user_ctx: *mut c_void,
    ) -> bool {
        // SAFETY: user_ctx is the Inner leaked in create(); it outlives the
        // registered callback because destroy() deletes the timer first.
        let inner = unsafe { &*(user_ctx as *const Inner) };
        (inner.handler)(inner.ctx)
    }

    impl FireTimer {
        /// Create, enable and start a 1 MHz up-counting timer.
        pub fn create(handler: AlarmHandler, ctx: *mut c_void) -> Result<FireTimer> {
            let mut cfg = gptimer_config_t {
                clk_src: gptimer_clock_source_t_GPTIMER_CLK_SRC_DEFAULT,
                direction: gptimer_count_direction_t_GPTIMER_COUNT_UP,
                resolution_hz: 1_000_000,
                intr_priority: 0,
                ..Default::default()
            };
            cfg.flags.set_intr_shared(1);

            let mut handle: gptimer_handle_t = core::ptr::null_mut();
            // SAFETY: cfg and handle are valid for the duration of the call.
            let rc = unsafe { gptimer_new_timer(&cfg, &mut handle) };
            if rc != ESP_OK {
                return Err(DimmerError::Timer(rc));
            }

            let inner = Box::into_raw(Box::new(Inner {
                handle,
                handler,
                ctx,
            }));

            let callbacks = gptimer_event_callbacks_t {
                on_alarm: Some(on_alarm),
            };
            // SAFETY: handle is a live timer; inner stays allocated until
            // destroy() deletes the timer.
            unsafe {
                let mut rc = gptimer_register_event_callbacks(handle, &callbacks, inner as *mut c_void);
                if rc == ESP_OK {
                    rc = gptimer_enable(handle);
                }
                if rc == ESP_OK {
                    rc = gptimer_start(handle);
                }
                if rc != ESP_OK {
                    gptimer_del_timer(handle);
                    drop(Box::from_raw(inner));
                    return Err(DimmerError::Timer(rc));
                }
                Ok(FireTimer(inner as *mut c_void))
            }
        }

        /// Stop and delete the timer, releasing its ISR resources.
        pub fn destroy(self) {
            let inner = self.inner();
            // SAFETY: handle is live; stop may return an error if already
            // stopped, which is fine during teardown.
            unsafe {
                gptimer_set_alarm_action(inner.handle, core::ptr::null());
                gptimer_stop(inner.handle);
                gptimer_disable(inner.handle);
                gptimer_del_timer(inner.handle);
                drop(Box::from_raw(self.0 as *mut Inner));
            }
        }

        pub fn set_count(&self, count: u64) {
            // SAFETY: raw register write on a live timer; ISR-safe.
            unsafe {
                gptimer_set_raw_count(self.inner().handle, count);
            }
        }

        pub fn count(&self) -> u64 {
            let mut value: u64 = 0;
            // SAFETY: raw register read on a live timer; ISR-safe.
            unsafe {
                gptimer_get_raw_count(self.inner().handle, &mut value);
            }
            value
        }

        pub fn arm_oneshot(&self, alarm_count: u64) {
            let mut cfg = gptimer_alarm_config_t {
                alarm_count,
                reload_count: 0,
                ..Default::default()
            };
            cfg.flags.set_auto_reload_on_alarm(0);
            // SAFETY: cfg valid for the call; ISR-safe.
            unsafe {
                gptimer_set_alarm_action(self.inner().handle, &cfg);
            }
        }

        pub fn arm_periodic(&self, period: u64) {
            let mut cfg = gptimer_alarm_config_t {
                alarm_count: period,
                reload_count: 0,
                ..Default::default()
            };
            cfg.flags.set_auto_reload_on_alarm(1);
            // SAFETY: cfg valid for the call.
            unsafe {
                gptimer_set_alarm_action(self.inner().handle, &cfg);
            }
        }

        pub fn disarm(&self) {
            // SAFETY: null alarm config clears the alarm.
            unsafe {
                gptimer_set_alarm_action(self.inner().handle, core::ptr::null());
            }
        }

        fn inner(&self) -> &Inner {
            // SAFETY: self.0 is the Inner leaked in create().
            unsafe { &*(self.0 as *const Inner) }
        }
    }
}

// ── Host simulation ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod imp {
    use super::*;
    use core::sync::atomic::AtomicU64;

    const UNARMED: u64 = u64::MAX;

    pub(super) struct Inner {
        count: AtomicU64,
        /// Absolute counter value the alarm fires at; UNARMED when off.
        armed: AtomicU64,
        /// Auto-reload period; 0 for one-shot alarms.
        period: AtomicU64,
        handler: AlarmHandler,
        ctx: *mut c_void,
    }

    impl FireTimer {
        pub fn create(handler: AlarmHandler, ctx: *mut c_void) -> Result<FireTimer> {
            let inner = Box::into_raw(Box::new(Inner {
                count: AtomicU64::new(0),
                armed: AtomicU64::new(UNARMED),
                period: AtomicU64::new(0),
                handler,
                ctx,
            }));
            Ok(FireTimer(inner as *mut c_void))
        }

        pub fn destroy(self) {
            // SAFETY: self.0 is the Inner leaked in create(); no alarm can
            // dispatch after this because advance() is only called by the
            // test that owns the engine.
            unsafe {
                drop(Box::from_raw(self.0 as *mut Inner));
            }
        }

        pub fn set_count(&self, count: u64) {
            self.inner().count.store(count, Ordering::Relaxed);
        }

        pub fn count(&self) -> u64 {
            self.inner().count.load(Ordering::Relaxed)
        }

        pub fn arm_oneshot(&self, alarm_count: u64) {
            let inner = self.inner();
            inner.period.store(0, Ordering::Relaxed);
            inner.armed.store(alarm_count, Ordering::Relaxed);
        }

        pub fn arm_periodic(&self, period: u64) {
            let inner = self.inner();
            inner.period.store(period, Ordering::Relaxed);
            inner.armed.store(period, Ordering::Relaxed);
        }

        pub fn disarm(&self) {
            let inner = self.inner();
            inner.period.store(0, Ordering::Relaxed);
            inner.armed.store(UNARMED, Ordering::Relaxed);
        }

        /// Advance simulated time by `us` microseconds, dispatching the
        /// alarm callback at every crossing exactly like the hardware
        /// counter would: a one-shot alarm lands on its programmed count, a
        /// periodic alarm reloads the counter to zero on every fire.
        pub fn advance(&self, us: u64) {
            let inner = self.inner();
            let mut remaining = us;
            loop {
                if remaining == 0 {
                    break;
                }
                let armed = inner.armed.load(Ordering::Relaxed);
                if armed != UNARMED {
                    let now = inner.count.load(Ordering::Relaxed);
                    let distance = armed.wrapping_sub(now);
                    if distance <= remaining {
                        remaining -= distance;
                        let period = inner.period.load(Ordering::Relaxed);
                        if period > 0 {
                            // Auto-reload: counter restarts from zero.
                            inner.count.store(0, Ordering::Relaxed);
                        } else {
                            inner.count.store(armed, Ordering::Relaxed);
                            inner.armed.store(UNARMED, Ordering::Relaxed);
                        }
                        (inner.handler)(inner.ctx);
                        continue;
                    }
                }
                let now = inner.count.load(Ordering::Relaxed);
                inner.count.store(now.wrapping_add(remaining), Ordering::Relaxed);
                break;
            }
        }

        fn inner(&self) -> &Inner {
            // SAFETY: self.0 is the Inner leaked in create().
            unsafe { &*(self.0 as *const Inner) }
        }
    }
}
