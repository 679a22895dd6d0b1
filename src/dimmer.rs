//! The public dimmer type: duty-cycle state machine plus one backend.
//!
//! All backends share the same programming model (a normalized duty-cycle
//! knob with a hard limit, a calibration remap and an optional power LUT)
//! and differ only in how `apply` realizes the resulting firing ratio.

use log::error;

use crate::backends::{
    Backend, BurstBackend, DacBackend, DacRange, DacSku, PhaseControlBackend, PwmBackend,
    PWM_DEFAULT_FREQUENCY_HZ, PWM_DEFAULT_RESOLUTION_BITS,
};
use crate::config::DimmerConfig;
use crate::diagnostics::{DimmerReport, HarmonicsReport};
use crate::duty::DutyState;
use crate::engine::{BurstEngine, FiringEngine};
use crate::error::{DimmerError, Result};
use crate::phase_math::Metrics;

pub struct Dimmer {
    state: DutyState,
    backend: Backend,
}

impl Dimmer {
    /// TRIAC / random-SSR dimmer driven by `engine`'s zero-cross timing.
    pub fn phase_control(engine: &'static FiringEngine, pin: i32) -> Self {
        Self::with_backend(Backend::PhaseControl(PhaseControlBackend::new(engine, pin)))
    }

    /// PWM dimmer with the default 1 kHz / 12-bit settings.
    pub fn pwm(pin: i32) -> Self {
        Self::pwm_with(pin, PWM_DEFAULT_FREQUENCY_HZ, PWM_DEFAULT_RESOLUTION_BITS)
    }

    /// PWM dimmer with explicit frequency and resolution.
    pub fn pwm_with(pin: i32, frequency_hz: u32, resolution_bits: u8) -> Self {
        Self::with_backend(Backend::Pwm(PwmBackend::new(pin, frequency_hz, resolution_bits)))
    }

    /// I2C DAC dimmer. `channel` 0/1 selects one output, 2 drives both.
    pub fn dac(port: u8, address: u8, sku: DacSku, range: DacRange, channel: u8) -> Self {
        Self::with_backend(Backend::Dac(DacBackend::new(port, address, sku, range, channel)))
    }

    /// Burst-fired dimmer (zero-cross SSR) driven by `engine`.
    pub fn burst(engine: &'static BurstEngine, pin: i32) -> Self {
        Self::with_backend(Backend::Burst(BurstBackend::new(engine, pin)))
    }

    /// Software-only dimmer: full state machine, no hardware.
    pub fn virtual_dimmer() -> Self {
        Self::with_backend(Backend::Virtual)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            state: DutyState::new(),
            backend,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Acquire hardware resources and replay the saved duty cycle.
    /// Idempotent. The dimmer stays dark until [`set_online`] marks the
    /// grid present.
    ///
    /// [`set_online`]: Self::set_online
    pub fn begin(&mut self) -> Result<()> {
        if self.state.enabled {
            return Ok(());
        }
        self.backend.begin()?;
        self.state.enabled = true;
        self.set_duty_cycle(self.state.duty_cycle());
        Ok(())
    }

    /// Flush hardware to off and release resources. Idempotent; the saved
    /// duty cycle survives for the next `begin`.
    pub fn end(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.state.enabled = false;
        self.state.online = false;
        self.state.zero_fire();
        let _ = self.backend.apply(&self.state);
        self.backend.end();
    }

    /// Mark the grid present or absent. Going offline forces the firing
    /// ratio to zero and commits it once; coming back online replays the
    /// saved duty cycle.
    pub fn set_online(&mut self, online: bool) {
        self.state.online = online;
        if !online {
            self.state.zero_fire();
            if self.state.enabled {
                let _ = self.backend.apply(&self.state);
            }
        } else {
            self.set_duty_cycle(self.state.duty_cycle());
        }
    }

    // ── Control ───────────────────────────────────────────────

    /// Set the power duty cycle in `[0, 1]`. Returns whether the backend
    /// committed the change. Always false while offline; the request is
    /// saved and replayed when the dimmer comes online.
    pub fn set_duty_cycle(&mut self, duty_cycle: f32) -> bool {
        let semi = self.backend.lut_semi_period(&self.state);
        self.state.set_request(duty_cycle, semi);
        self.is_online() && self.backend.apply(&self.state)
    }

    /// Hard ceiling on the duty cycle; an over-limit request is pulled
    /// down immediately.
    pub fn set_duty_cycle_limit(&mut self, limit: f32) {
        let semi = self.backend.lut_semi_period(&self.state);
        let before = self.state.duty_cycle();
        self.state.set_limit(limit, semi);
        if self.state.duty_cycle() != before {
            self.set_duty_cycle(self.state.duty_cycle());
        }
    }

    /// Remapped "0" of the duty-cycle range (Shelly-style calibration).
    pub fn set_duty_cycle_min(&mut self, min: f32) {
        let semi = self.backend.lut_semi_period(&self.state);
        self.state.set_min(min, semi);
        self.set_duty_cycle(self.state.duty_cycle());
    }

    /// Remapped "1" of the duty-cycle range.
    pub fn set_duty_cycle_max(&mut self, max: f32) {
        let semi = self.backend.lut_semi_period(&self.state);
        self.state.set_max(max, semi);
        self.set_duty_cycle(self.state.duty_cycle());
    }

    pub fn on(&mut self) -> bool {
        self.set_duty_cycle(1.0)
    }

    pub fn off(&mut self) -> bool {
        self.set_duty_cycle(0.0)
    }

    /// Enable or disable the power LUT so the knob is linear in delivered
    /// power rather than in firing time.
    ///
    /// Enabling requires a semi-period: pass one in `semi_period_us`, or 0
    /// to keep whatever is already set (an error if nothing is).
    pub fn enable_power_lut(&mut self, enable: bool, semi_period_us: u16) -> Result<()> {
        if enable {
            match &self.backend {
                Backend::PhaseControl(b) => {
                    if semi_period_us > 0 {
                        b.engine().set_semi_period(semi_period_us);
                    }
                    if b.engine().semi_period() == 0 {
                        error!("enable_power_lut: no semi-period set");
                        return Err(DimmerError::SemiPeriodUnset);
                    }
                }
                Backend::Burst(b) => {
                    if semi_period_us > 0 {
                        b.engine().set_semi_period(semi_period_us);
                    }
                    if b.engine().semi_period() == 0 {
                        error!("enable_power_lut: no semi-period set");
                        return Err(DimmerError::SemiPeriodUnset);
                    }
                }
                _ => {
                    if semi_period_us > 0 {
                        self.state.set_semi_period(semi_period_us);
                    }
                    if self.state.semi_period() == 0 {
                        error!("enable_power_lut: no semi-period set");
                        return Err(DimmerError::SemiPeriodUnset);
                    }
                }
            }
        }
        self.state.set_power_lut(enable);
        self.set_duty_cycle(self.state.duty_cycle());
        Ok(())
    }

    /// Set the mains semi-period: on the shared engine for phase-control
    /// and burst dimmers, on this dimmer alone for the others.
    pub fn set_semi_period(&mut self, semi_period_us: u16) {
        match &self.backend {
            Backend::PhaseControl(b) => b.engine().set_semi_period(semi_period_us),
            Backend::Burst(b) => b.engine().set_semi_period(semi_period_us),
            _ => self.state.set_semi_period(semi_period_us),
        }
        self.set_duty_cycle(self.state.duty_cycle());
    }

    /// Apply a bundle of configuration values.
    pub fn configure(&mut self, config: &DimmerConfig) -> Result<()> {
        self.set_duty_cycle_limit(config.duty_cycle_limit);
        self.set_duty_cycle_min(config.duty_cycle_min);
        self.set_duty_cycle_max(config.duty_cycle_max);
        if config.power_lut {
            self.enable_power_lut(true, config.semi_period_us)?;
        } else if config.semi_period_us > 0 {
            self.set_semi_period(config.semi_period_us);
        }
        Ok(())
    }

    // ── State queries ─────────────────────────────────────────

    pub fn kind(&self) -> &'static str {
        self.backend.type_name()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn is_online(&self) -> bool {
        self.state.enabled && self.state.online
    }

    pub fn is_on(&self) -> bool {
        self.is_online() && self.state.duty_cycle() > 0.0
    }

    pub fn is_off(&self) -> bool {
        !self.is_on()
    }

    pub fn is_on_at_full_power(&self) -> bool {
        self.state.duty_cycle() >= self.state.max()
    }

    pub fn is_power_lut_enabled(&self) -> bool {
        self.state.power_lut()
    }

    /// Semi-period used for power-LUT conversion, or 0 when the LUT is off.
    pub fn power_lut_semi_period(&self) -> u16 {
        if self.state.power_lut() {
            self.backend.lut_semi_period(&self.state)
        } else {
            0
        }
    }

    pub fn duty_cycle(&self) -> f32 {
        self.state.duty_cycle()
    }

    pub fn duty_cycle_mapped(&self) -> f32 {
        self.state.mapped()
    }

    /// The conduction ratio actually driven to the hardware: 0 while
    /// offline, otherwise the post-limit, post-remap, post-LUT value.
    pub fn duty_cycle_fire(&self) -> f32 {
        if self.is_online() {
            self.state.fire()
        } else {
            0.0
        }
    }

    pub fn duty_cycle_limit(&self) -> f32 {
        self.state.limit()
    }

    pub fn duty_cycle_min(&self) -> f32 {
        self.state.min()
    }

    pub fn duty_cycle_max(&self) -> f32 {
        self.state.max()
    }

    /// Linear power ratio currently delivered. With the LUT on, the mapped
    /// duty *is* the power ratio; with it off, the conduction equation
    /// gives the ratio from the firing time.
    pub fn power_ratio(&self) -> f32 {
        if self.state.power_lut() {
            self.state.mapped()
        } else {
            let d = self.duty_cycle_fire();
            d - (2.0 * core::f32::consts::PI * d).sin() / (2.0 * core::f32::consts::PI)
        }
    }

    /// Firing delay in microseconds (phase-control dimmers only).
    pub fn firing_delay(&self) -> Option<u16> {
        match &self.backend {
            Backend::PhaseControl(b) => Some(b.firing_delay()),
            _ => None,
        }
    }

    /// Firing angle in degrees (phase-control dimmers only).
    pub fn phase_angle(&self) -> Option<f32> {
        match &self.backend {
            Backend::PhaseControl(b) => Some(b.phase_angle()),
            _ => None,
        }
    }

    // ── Metrics ───────────────────────────────────────────────

    /// Harmonic magnitudes as percent of the fundamental: `out[0]` = H1,
    /// `out[i]` = H(2i+1).
    pub fn calculate_harmonics(&self, out: &mut [f32]) -> Result<()> {
        self.backend.harmonics(self.state.fire(), out)
    }

    /// Electrical metrics for a resistive load at the current firing ratio.
    pub fn calculate_metrics(&self, grid_voltage: f32, load_resistance: f32) -> Result<Metrics> {
        if !self.state.enabled {
            return Err(DimmerError::Disabled);
        }
        self.backend
            .metrics(self.state.fire(), grid_voltage, load_resistance)
    }

    // ── Diagnostics ───────────────────────────────────────────

    /// Snapshot of the dimmer for diagnostic export.
    pub fn report(&self) -> DimmerReport {
        let mut harmonics = [f32::NAN; 11];
        let _ = self.calculate_harmonics(&mut harmonics);

        let (pin, frequency, resolution, sku, i2c_address, channel) = match &self.backend {
            Backend::PhaseControl(b) => (Some(b.pin()), None, None, None, None, None),
            Backend::Pwm(b) => (
                Some(b.pin()),
                Some(b.frequency_hz()),
                Some(b.resolution_bits()),
                None,
                None,
                None,
            ),
            Backend::Dac(b) => (
                None,
                None,
                Some(b.resolution_bits()),
                Some(b.sku().name()),
                Some(b.address()),
                Some(b.channel()),
            ),
            Backend::Burst(b) => (Some(b.pin()), None, None, None, None, None),
            Backend::Virtual => (None, None, None, None, None, None),
        };

        DimmerReport {
            kind: self.kind(),
            enabled: self.state.enabled,
            online: self.state.online,
            state: if self.is_on() { "on" } else { "off" },
            semi_period: self.backend.lut_semi_period(&self.state),
            duty_cycle: self.state.duty_cycle(),
            duty_cycle_mapped: self.state.mapped(),
            duty_cycle_fire: self.state.fire(),
            duty_cycle_limit: self.state.limit(),
            duty_cycle_min: self.state.min(),
            duty_cycle_max: self.state.max(),
            power_lut: self.state.power_lut(),
            pin,
            firing_delay: self.firing_delay(),
            phase_angle: self.phase_angle(),
            frequency,
            resolution,
            sku,
            i2c_address,
            channel,
            harmonics: HarmonicsReport::from_magnitudes(&harmonics),
        }
    }
}
