//! Multi-backend AC dimmer library for ESP32-class MCUs.
//!
//! Drives mains loads (resistive heaters, incandescent lamps, voltage
//! regulators behind analog convertors) by controlling *when* current
//! flows during each half-cycle of the mains sine. Every backend exposes
//! the same normalized duty-cycle knob; the realization differs:
//!
//! - **phase-control**: TRIAC/random-SSR gate firing synchronized to an
//!   external zero-cross detector, microsecond-timed by a shared
//!   [`FiringEngine`];
//! - **pwm**: LEDC PWM into a PWM-to-0-10V convertor;
//! - **dac-i2c**: GP8xxx I2C DAC driving a 0-5 V / 0-10 V input;
//! - **burst**: integral half-cycle control for zero-cross SSRs via a
//!   shared [`BurstEngine`];
//! - **virtual**: state machine only, no hardware.
//!
//! All hardware access is guarded by `#[cfg(target_os = "espidf")]` with
//! in-memory simulations on the host, so the duty-cycle pipeline and both
//! firing engines are fully testable off-target.
//!
//! ```no_run
//! use acdimmer::{config::SEMI_PERIOD_50HZ_US, Dimmer, FiringEngine};
//!
//! let engine: &'static FiringEngine = Box::leak(Box::new(FiringEngine::new()));
//! engine.set_semi_period(SEMI_PERIOD_50HZ_US);
//!
//! let mut heater = Dimmer::phase_control(engine, 25);
//! heater.begin()?;
//! heater.enable_power_lut(true, 0)?;
//! heater.set_online(true);
//! heater.set_duty_cycle(0.5);
//! // Wire the zero-cross detector to FiringEngine::on_zero_cross with
//! // the engine as ctx.
//! # Ok::<(), acdimmer::DimmerError>(())
//! ```

#![deny(unused_must_use)]

pub mod backends;
pub mod config;
pub mod diagnostics;
pub mod dimmer;
pub mod duty;
pub mod engine;
pub mod error;
pub mod hw;
pub mod lut;
pub mod phase_math;

pub use backends::{DacRange, DacSku, DAC_DEFAULT_ADDRESS};
pub use dimmer::Dimmer;
pub use engine::{BurstEngine, FiringEngine, BURST_WINDOW, MAX_DIMMERS, PHASE_DELAY_MIN_US};
pub use error::{DimmerError, Result};
pub use phase_math::Metrics;
