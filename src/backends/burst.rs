//! Burst (integral half-cycle) backend for zero-cross SSRs.
//!
//! `apply` converts the firing ratio into an integer on-count over the
//! scheduling window and latches it into the [`BurstEngine`]; all edge
//! decisions happen in the engine's half-cycle alarm.

use log::{error, info};

use crate::duty::DutyState;
use crate::engine::{BurstEngine, SlotId, BURST_WINDOW};
use crate::error::{DimmerError, Result};
use crate::hw::gpio;

pub struct BurstBackend {
    engine: &'static BurstEngine,
    pin: i32,
    slot: Option<SlotId>,
}

impl BurstBackend {
    pub fn new(engine: &'static BurstEngine, pin: i32) -> Self {
        Self {
            engine,
            pin,
            slot: None,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        if !gpio::is_valid_output(self.pin) {
            error!("Invalid pin: {}", self.pin);
            return Err(DimmerError::InvalidPin(self.pin));
        }
        info!("Enable burst dimmer on pin {}", self.pin);
        gpio::config_output(self.pin)?;
        self.slot = Some(self.engine.register(self.pin)?);
        Ok(())
    }

    pub fn end(&mut self) {
        if let Some(slot) = self.slot.take() {
            info!("Disable burst dimmer on pin {}", self.pin);
            self.engine.unregister(slot);
            gpio::write(self.pin, false);
        }
    }

    pub fn apply(&mut self, state: &DutyState) -> bool {
        let Some(slot) = self.slot else {
            return false;
        };
        let target = if state.online {
            (state.fire() * BURST_WINDOW as f32 + 0.5) as u8
        } else {
            0
        };
        self.engine.set_target(slot, target);
        self.engine.sync_alarm();
        true
    }

    pub fn engine(&self) -> &'static BurstEngine {
        self.engine
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }
}
