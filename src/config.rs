//! Dimmer configuration parameters.
//!
//! Bundles the user-tunable knobs so applications can persist them (NVS,
//! file, MQTT retained message) and apply them in one call.

use serde::{Deserialize, Serialize};

/// Mains semi-period at 50 Hz, microseconds.
pub const SEMI_PERIOD_50HZ_US: u16 = 10_000;
/// Mains semi-period at 60 Hz, microseconds.
pub const SEMI_PERIOD_60HZ_US: u16 = 8_333;

/// Per-dimmer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimmerConfig {
    /// Hard ceiling on the duty cycle (0.0 - 1.0).
    pub duty_cycle_limit: f32,
    /// Remapped "0" of the duty-cycle range (0.0 - 1.0).
    pub duty_cycle_min: f32,
    /// Remapped "1" of the duty-cycle range (0.0 - 1.0).
    pub duty_cycle_max: f32,
    /// Linearize the knob in delivered power via the firing-delay LUT.
    pub power_lut: bool,
    /// Mains semi-period in microseconds; 0 = not configured.
    pub semi_period_us: u16,
}

impl Default for DimmerConfig {
    fn default() -> Self {
        Self {
            duty_cycle_limit: 1.0,
            duty_cycle_min: 0.0,
            duty_cycle_max: 1.0,
            power_lut: false,
            semi_period_us: 0,
        }
    }
}
