//! PWM backend for voltage regulators driven through a PWM-to-analog
//! convertor (0-10 V input). No zero-cross coupling: the LEDC peripheral
//! free-runs and the downstream regulator does the actual phase control.

use log::{error, info};

use crate::duty::DutyState;
use crate::error::{DimmerError, Result};
use crate::hw::{gpio, ledc};

pub const PWM_DEFAULT_FREQUENCY_HZ: u32 = 1_000;
pub const PWM_DEFAULT_RESOLUTION_BITS: u8 = 12;

pub struct PwmBackend {
    pin: i32,
    frequency_hz: u32,
    resolution_bits: u8,
    channel: Option<u8>,
}

impl PwmBackend {
    pub fn new(pin: i32, frequency_hz: u32, resolution_bits: u8) -> Self {
        Self {
            pin,
            frequency_hz,
            resolution_bits,
            channel: None,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        if !gpio::is_valid_output(self.pin) {
            error!("Invalid pin: {}", self.pin);
            return Err(DimmerError::InvalidPin(self.pin));
        }
        info!(
            "Enable PWM dimmer on pin {} ({} Hz, {} bits)",
            self.pin, self.frequency_hz, self.resolution_bits
        );
        let channel = ledc::attach(self.pin, self.frequency_hz, self.resolution_bits)?;
        if let Err(e) = ledc::set_duty(channel, 0) {
            error!("Failed to zero LEDC channel {channel} on pin {}", self.pin);
            ledc::detach(channel, self.pin);
            return Err(e);
        }
        self.channel = Some(channel);
        Ok(())
    }

    pub fn end(&mut self) {
        if let Some(channel) = self.channel.take() {
            info!("Disable PWM dimmer on pin {}", self.pin);
            ledc::detach(channel, self.pin);
        }
    }

    pub fn apply(&mut self, state: &DutyState) -> bool {
        let Some(channel) = self.channel else {
            return false;
        };
        let duty = if state.online {
            let max = (1u32 << self.resolution_bits) - 1;
            (state.fire() * max as f32).round() as u32
        } else {
            0
        };
        ledc::set_duty(channel, duty).is_ok()
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }
}
