//! GPIO helpers for dimmer gate pins.
//!
//! On ESP-IDF: raw `gpio_*` sys calls. `write_isr` is a plain register
//! write and safe to call from ISR context.
//!
//! On host/test: pin levels and write counts are tracked in-memory so tests
//! can observe every edge the engines produce. The simulated pins are
//! process-global, so tests should use distinct pin numbers per test case.

use crate::error::{DimmerError, Result};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Check that a pin can drive an output.
#[cfg(target_os = "espidf")]
pub fn is_valid_output(pin: i32) -> bool {
    pin >= 0 && pin < 64 && ((1u64 << pin) & SOC_GPIO_VALID_OUTPUT_GPIO_MASK as u64) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn is_valid_output(pin: i32) -> bool {
    (0..=48).contains(&pin)
}

/// Configure a pin as a push-pull output, driven low.
#[cfg(target_os = "espidf")]
pub fn config_output(pin: i32) -> Result<()> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: cfg is valid for the call; pin was validated by the caller.
    let rc = unsafe { gpio_config(&cfg) };
    if rc != ESP_OK {
        return Err(DimmerError::InvalidPin(pin));
    }
    // SAFETY: pin is a configured output.
    unsafe { gpio_set_level(pin, 0) };
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn config_output(pin: i32) -> Result<()> {
    if !is_valid_output(pin) {
        return Err(DimmerError::InvalidPin(pin));
    }
    sim::write(pin, false);
    Ok(())
}

/// Drive a pin from foreground context.
#[cfg(target_os = "espidf")]
pub fn write(pin: i32, high: bool) {
    // SAFETY: register write to an already-configured output pin.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn write(pin: i32, high: bool) {
    sim::write(pin, high);
}

/// Drive a pin from ISR context. Must not allocate or block.
#[cfg(target_os = "espidf")]
pub fn write_isr(pin: i32, high: bool) {
    // SAFETY: gpio_set_level is a bare register write; ISR-safe.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn write_isr(pin: i32, high: bool) {
    sim::write(pin, high);
}

// ── Host simulation ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    /// Bit n = current level of pin n.
    static LEVELS: AtomicU64 = AtomicU64::new(0);

    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: AtomicU32 = AtomicU32::new(0);
    /// Total writes (any level) per pin.
    static WRITES: [AtomicU32; 64] = [ZERO; 64];

    pub fn write(pin: i32, high: bool) {
        let bit = 1u64 << pin;
        if high {
            LEVELS.fetch_or(bit, Ordering::SeqCst);
        } else {
            LEVELS.fetch_and(!bit, Ordering::SeqCst);
        }
        WRITES[pin as usize].fetch_add(1, Ordering::SeqCst);
    }

    pub fn level(pin: i32) -> bool {
        LEVELS.load(Ordering::SeqCst) & (1u64 << pin) != 0
    }

    pub fn write_count(pin: i32) -> u32 {
        WRITES[pin as usize].load(Ordering::SeqCst)
    }
}

/// Current simulated level of a pin (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_level(pin: i32) -> bool {
    sim::level(pin)
}

/// Number of simulated writes a pin has received (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_write_count(pin: i32) -> u32 {
    sim::write_count(pin)
}
