//! Closed-form electrical math for a phase-controlled resistive load.
//!
//! Everything here takes the *conduction* duty cycle `d` (the fraction of
//! each half-cycle during which the load conducts) and derives the firing
//! angle `alpha = pi * (1 - d)` internally. Only odd harmonics exist: the
//! half-wave symmetry of a symmetric dimmer cancels the even ones.
//!
//! All of this runs in foreground context; nothing here is ISR-safe or
//! needs to be.

use core::f32::consts::{FRAC_1_SQRT_2, PI};

use crate::error::{DimmerError, Result};

/// Electrical metrics of a resistive load behind a dimmer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Active power delivered to the load, W.
    pub power: f32,
    /// Apparent power drawn from the grid, VA.
    pub apparent_power: f32,
    /// RMS load current, A.
    pub current: f32,
    /// RMS load voltage, V.
    pub voltage: f32,
    /// Power factor. NaN at zero conduction.
    pub power_factor: f32,
    /// Total harmonic distortion of the current, %. NaN at zero conduction.
    pub thdi: f32,
}

/// Compute odd-harmonic magnitudes as percentages of the fundamental.
///
/// `out[0]` receives H1 = 100 (the anchor), `out[i]` receives H(2i+1).
/// At `duty_fire == 0` every entry is zero; at `1` only the fundamental
/// remains. Fails with [`DimmerError::Indeterminate`] when the fundamental
/// is too small to normalize against.
pub fn phase_control_harmonics(duty_fire: f32, out: &mut [f32]) -> Result<()> {
    if out.is_empty() {
        return Ok(());
    }

    if duty_fire <= 0.0 {
        out.fill(0.0);
        return Ok(());
    }
    if duty_fire >= 1.0 {
        out.fill(0.0);
        out[0] = 100.0;
        return Ok(());
    }

    let firing_angle = PI * (1.0 - duty_fire);

    // RMS of the fundamental, per unit of peak sine amplitude.
    let sin_2a = (2.0 * firing_angle).sin();
    let i1_rms = ((2.0 / PI) * (PI - firing_angle + 0.5 * sin_2a)).sqrt();
    if i1_rms <= 0.001 {
        return Err(DimmerError::Indeterminate);
    }

    out[0] = 100.0;

    let scale_factor = (2.0 / PI) * FRAC_1_SQRT_2 * 100.0 / i1_rms;

    // Fourier coefficients of the chopped sine for n = 3, 5, 7, ...
    for (i, slot) in out.iter_mut().enumerate().skip(1) {
        let n = (2 * i + 1) as f32;
        let coeff = ((n - 1.0) * firing_angle).cos() / (n - 1.0)
            - ((n + 1.0) * firing_angle).cos() / (n + 1.0);
        *slot = coeff.abs() * scale_factor;
    }

    Ok(())
}

/// Metrics for a purely resistive load under *phase-angle* control.
///
/// The identities are exact for a chopped sine into a resistor:
/// `P = d * V^2/R`, `PF = sqrt(d)`, `THDi = 100 * sqrt(1/d - 1)`.
pub fn phase_control_metrics(duty_fire: f32, grid_voltage: f32, load_resistance: f32) -> Result<Metrics> {
    let nominal_power = check_load(grid_voltage, load_resistance)?;

    if duty_fire <= 0.0 {
        return Ok(Metrics {
            power: 0.0,
            apparent_power: 0.0,
            current: 0.0,
            voltage: 0.0,
            power_factor: f32::NAN,
            thdi: f32::NAN,
        });
    }
    if duty_fire >= 1.0 {
        return Ok(Metrics {
            power: nominal_power,
            apparent_power: nominal_power,
            current: grid_voltage / load_resistance,
            voltage: grid_voltage,
            power_factor: 1.0,
            thdi: 0.0,
        });
    }

    let power_factor = duty_fire.sqrt();
    let voltage = power_factor * grid_voltage;
    let current = voltage / load_resistance;
    Ok(Metrics {
        power: duty_fire * nominal_power,
        apparent_power: grid_voltage * current,
        current,
        voltage,
        power_factor,
        thdi: 100.0 * (1.0 / duty_fire - 1.0).sqrt(),
    })
}

/// Metrics for a resistive load under *integral-cycle* (burst) control.
///
/// Full sine cycles are passed or blocked, so there is no phase distortion:
/// the RMS identities `PF = sqrt(d)` and `V_out = sqrt(d) * V` still hold,
/// but THDi is zero inside the conducting window.
pub fn integral_cycle_metrics(duty_fire: f32, grid_voltage: f32, load_resistance: f32) -> Result<Metrics> {
    let mut m = phase_control_metrics(duty_fire, grid_voltage, load_resistance)?;
    if duty_fire > 0.0 && duty_fire < 1.0 {
        m.thdi = 0.0;
    }
    Ok(m)
}

fn check_load(grid_voltage: f32, load_resistance: f32) -> Result<f32> {
    if !(grid_voltage > 0.0) {
        return Err(DimmerError::InvalidInput("grid_voltage"));
    }
    if !(load_resistance > 0.0) {
        return Err(DimmerError::InvalidInput("load_resistance"));
    }
    Ok(grid_voltage * grid_voltage / load_resistance)
}
