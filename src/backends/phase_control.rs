//! Phase-control (TRIAC / random SSR) backend.
//!
//! Owns a gate pin and a slot in the [`FiringEngine`]. `apply` only
//! *derives* the integer firing delay; all edge timing happens in the
//! engine's ISRs.

use log::{error, info};

use crate::duty::DutyState;
use crate::engine::firing::DELAY_NONE;
use crate::engine::{FiringEngine, SlotId, PHASE_DELAY_MIN_US};
use crate::error::{DimmerError, Result};
use crate::hw::gpio;

/// Derive the firing delay latched into the engine for the next half-cycle.
///
/// - off, offline or unknown semi-period: sentinel, do not fire;
/// - full on: zero, the gate stays high through the half-cycle;
/// - otherwise `(1 - fire) * semi_period`, floored at the gate-current
///   minimum.
fn derive_delay(fire: f32, online: bool, semi_period_us: u16) -> u16 {
    if !online || semi_period_us == 0 || fire == 0.0 {
        return DELAY_NONE;
    }
    if fire == 1.0 {
        return 0;
    }
    let delay = ((1.0 - fire) * semi_period_us as f32) as u16;
    delay.max(PHASE_DELAY_MIN_US)
}

pub struct PhaseControlBackend {
    engine: &'static FiringEngine,
    pin: i32,
    slot: Option<SlotId>,
    /// Last derived firing delay, for metrics and diagnostics.
    delay_us: u16,
}

impl PhaseControlBackend {
    pub fn new(engine: &'static FiringEngine, pin: i32) -> Self {
        Self {
            engine,
            pin,
            slot: None,
            delay_us: DELAY_NONE,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        if !gpio::is_valid_output(self.pin) {
            error!("Invalid pin: {}", self.pin);
            return Err(DimmerError::InvalidPin(self.pin));
        }
        info!("Enable dimmer on pin {}", self.pin);
        gpio::config_output(self.pin)?;
        self.slot = Some(self.engine.register(self.pin)?);
        Ok(())
    }

    pub fn end(&mut self) {
        if let Some(slot) = self.slot.take() {
            info!("Disable dimmer on pin {}", self.pin);
            self.engine.unregister(slot);
            gpio::write(self.pin, false);
        }
    }

    pub fn apply(&mut self, state: &DutyState) -> bool {
        self.delay_us = derive_delay(state.fire(), state.online, self.engine.semi_period());
        if let Some(slot) = self.slot {
            self.engine.set_delay(slot, self.delay_us);
        }
        true
    }

    pub fn engine(&self) -> &'static FiringEngine {
        self.engine
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    /// Firing delay in us, capped at the semi-period.
    /// Semi-period at 0% power, 0 at 100%.
    pub fn firing_delay(&self) -> u16 {
        let semi = self.engine.semi_period();
        self.delay_us.min(semi)
    }

    /// Firing angle in degrees: 180 at 0% power, 0 at 100%.
    pub fn phase_angle(&self) -> f32 {
        let semi = self.engine.semi_period();
        if self.delay_us >= semi {
            180.0
        } else {
            180.0 * self.delay_us as f32 / semi as f32
        }
    }
}
