//! LEDC PWM channel management for the PWM dimmer backend.
//!
//! Channels are allocated from a process-wide bitmask; each channel uses
//! the LEDC timer with the same index modulo 4, so up to four distinct
//! frequency/resolution combinations can coexist.
//!
//! On host/test the duty registers are tracked in-memory.

use crate::error::{DimmerError, Result};

use core::sync::atomic::{AtomicU8, Ordering};

pub const LEDC_CHANNELS: u8 = 8;
const LEDC_TIMERS: u8 = 4;

/// Bit n set = channel n in use.
static CHANNELS_IN_USE: AtomicU8 = AtomicU8::new(0);

fn allocate_channel() -> Result<u8> {
    loop {
        let used = CHANNELS_IN_USE.load(Ordering::Acquire);
        let free = (!used).trailing_zeros() as u8;
        if free >= LEDC_CHANNELS {
            return Err(DimmerError::Ledc(-1));
        }
        if CHANNELS_IN_USE
            .compare_exchange(used, used | (1 << free), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return Ok(free);
        }
    }
}

fn release_channel(channel: u8) {
    CHANNELS_IN_USE.fetch_and(!(1 << channel), Ordering::AcqRel);
}

/// Configure a timer + channel pair for `pin` and return the channel.
#[cfg(target_os = "espidf")]
pub fn attach(pin: i32, frequency_hz: u32, resolution_bits: u8) -> Result<u8> {
    use esp_idf_svc::sys::*;

    let channel = allocate_channel()?;
    let timer = (channel % LEDC_TIMERS) as u32;

    let timer_cfg = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: timer,
        duty_resolution: resolution_bits as u32,
        freq_hz: frequency_hz,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: cfg structs are valid for the calls; channel is exclusively
    // ours via the allocation bitmask.
    unsafe {
        let rc = ledc_timer_config(&timer_cfg);
        if rc != ESP_OK {
            release_channel(channel);
            return Err(DimmerError::Ledc(rc));
        }

        let channel_cfg = ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: channel as u32,
            timer_sel: timer,
            gpio_num: pin,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        let rc = ledc_channel_config(&channel_cfg);
        if rc != ESP_OK {
            release_channel(channel);
            return Err(DimmerError::Ledc(rc));
        }
    }
    Ok(channel)
}

#[cfg(not(target_os = "espidf"))]
pub fn attach(pin: i32, _frequency_hz: u32, _resolution_bits: u8) -> Result<u8> {
    let channel = allocate_channel()?;
    sim::bind_pin(channel, pin);
    Ok(channel)
}

/// Write a duty value to an attached channel.
#[cfg(target_os = "espidf")]
pub fn set_duty(channel: u8, duty: u32) -> Result<()> {
    use esp_idf_svc::sys::*;

    // SAFETY: channel was configured in attach(); duty register writes are
    // race-free because only the owning dimmer writes this channel.
    unsafe {
        let rc = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel as u32, duty);
        if rc != ESP_OK {
            return Err(DimmerError::Ledc(rc));
        }
        let rc = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel as u32);
        if rc != ESP_OK {
            return Err(DimmerError::Ledc(rc));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn set_duty(channel: u8, duty: u32) -> Result<()> {
    sim::set_duty(channel, duty);
    Ok(())
}

/// Stop the channel, release it and leave the pin low.
#[cfg(target_os = "espidf")]
pub fn detach(channel: u8, pin: i32) {
    use esp_idf_svc::sys::*;

    // SAFETY: stopping an attached channel with idle level 0.
    unsafe {
        ledc_stop(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel as u32, 0);
    }
    release_channel(channel);
    super::gpio::write(pin, false);
}

#[cfg(not(target_os = "espidf"))]
pub fn detach(channel: u8, pin: i32) {
    sim::set_duty(channel, 0);
    release_channel(channel);
    super::gpio::write(pin, false);
}

// ── Host simulation ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: AtomicU32 = AtomicU32::new(0);
    static DUTIES: [AtomicU32; super::LEDC_CHANNELS as usize] = [ZERO; 8];

    #[allow(clippy::declare_interior_mutable_const)]
    const NO_PIN: AtomicI32 = AtomicI32::new(-1);
    static PINS: [AtomicI32; super::LEDC_CHANNELS as usize] = [NO_PIN; 8];

    pub fn bind_pin(channel: u8, pin: i32) {
        PINS[channel as usize].store(pin, Ordering::SeqCst);
    }

    pub fn set_duty(channel: u8, duty: u32) {
        DUTIES[channel as usize].store(duty, Ordering::SeqCst);
    }

    pub fn duty(channel: u8) -> u32 {
        DUTIES[channel as usize].load(Ordering::SeqCst)
    }

    pub fn duty_for_pin(pin: i32) -> Option<u32> {
        PINS.iter()
            .position(|p| p.load(Ordering::SeqCst) == pin)
            .map(|ch| DUTIES[ch].load(Ordering::SeqCst))
    }
}

/// Last duty written to a channel (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_duty(channel: u8) -> u32 {
    sim::duty(channel)
}

/// Last duty written to the channel attached to `pin` (host only). Tests
/// should use a unique pin per test case.
#[cfg(not(target_os = "espidf"))]
pub fn sim_duty_for_pin(pin: i32) -> Option<u32> {
    sim::duty_for_pin(pin)
}
