//! Dimmer backends: the hardware mechanisms that realize a duty cycle.
//!
//! The backend set is closed and bounded, so dispatch is a tagged enum and
//! a `match`, with no trait objects on the hot path.

pub mod burst;
pub mod dac;
pub mod phase_control;
pub mod pwm;

pub use burst::BurstBackend;
pub use dac::{DacBackend, DacRange, DacSku, DAC_DEFAULT_ADDRESS};
pub use phase_control::PhaseControlBackend;
pub use pwm::{PwmBackend, PWM_DEFAULT_FREQUENCY_HZ, PWM_DEFAULT_RESOLUTION_BITS};

use crate::duty::DutyState;
use crate::error::Result;
use crate::phase_math::{self, Metrics};

pub(crate) enum Backend {
    PhaseControl(PhaseControlBackend),
    Pwm(PwmBackend),
    Dac(DacBackend),
    Burst(BurstBackend),
    /// No-op backend for software-only dimmers (tests, placeholders).
    Virtual,
}

impl Backend {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PhaseControl(_) => "phase-control",
            Self::Pwm(_) => "pwm",
            Self::Dac(_) => "dac-i2c",
            Self::Burst(_) => "burst",
            Self::Virtual => "virtual",
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        match self {
            Self::PhaseControl(b) => b.begin(),
            Self::Pwm(b) => b.begin(),
            Self::Dac(b) => b.begin(),
            Self::Burst(b) => b.begin(),
            Self::Virtual => Ok(()),
        }
    }

    pub fn end(&mut self) {
        match self {
            Self::PhaseControl(b) => b.end(),
            Self::Pwm(b) => b.end(),
            Self::Dac(b) => b.end(),
            Self::Burst(b) => b.end(),
            Self::Virtual => {}
        }
    }

    /// Commit the current duty state to hardware. Returns whether the
    /// backend accepted it.
    pub fn apply(&mut self, state: &DutyState) -> bool {
        match self {
            Self::PhaseControl(b) => b.apply(state),
            Self::Pwm(b) => b.apply(state),
            Self::Dac(b) => b.apply(state),
            Self::Burst(b) => b.apply(state),
            Self::Virtual => true,
        }
    }

    /// Semi-period used for power-LUT conversion: the shared engine's for
    /// the engine-driven backends (process-wide), the dimmer's own for the
    /// others.
    pub fn lut_semi_period(&self, state: &DutyState) -> u16 {
        match self {
            Self::PhaseControl(b) => b.engine().semi_period(),
            Self::Burst(b) => b.engine().semi_period(),
            _ => state.semi_period(),
        }
    }

    pub fn harmonics(&self, fire: f32, out: &mut [f32]) -> Result<()> {
        match self {
            // The analog convertor downstream of PWM/DAC phase-controls the
            // load, so the phase-control spectrum applies to all three.
            Self::PhaseControl(_) | Self::Pwm(_) | Self::Dac(_) => {
                phase_math::phase_control_harmonics(fire, out)
            }
            // Burst control passes whole sine cycles: fundamental only.
            Self::Burst(_) | Self::Virtual => {
                out.fill(0.0);
                if fire > 0.0 {
                    if let Some(h1) = out.first_mut() {
                        *h1 = 100.0;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn metrics(&self, fire: f32, grid_voltage: f32, load_resistance: f32) -> Result<Metrics> {
        match self {
            Self::Burst(_) => phase_math::integral_cycle_metrics(fire, grid_voltage, load_resistance),
            _ => phase_math::phase_control_metrics(fire, grid_voltage, load_resistance),
        }
    }
}
