//! Unified error types for the dimmer library.
//!
//! A single `DimmerError` enum that every backend can convert into, keeping
//! the caller's error handling uniform. All variants are `Copy` so they can
//! be passed around freely without allocation.

use core::fmt;

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimmerError {
    /// The configured GPIO cannot be used as an output.
    InvalidPin(i32),
    /// A semi-period is required (power LUT, phase control) but none is set.
    SemiPeriodUnset,
    /// Operation requires an enabled dimmer.
    Disabled,
    /// The firing-engine slot table is full.
    RegistryFull,
    /// LEDC timer/channel configuration or duty write failed.
    Ledc(i32),
    /// I2C transaction failed (NACK, bus error).
    I2c(i32),
    /// Fire timer creation or control failed.
    Timer(i32),
    /// An input parameter is out of its documented range.
    InvalidInput(&'static str),
    /// The requested quantity cannot be computed at the current duty cycle.
    Indeterminate,
}

impl fmt::Display for DimmerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid output pin: {pin}"),
            Self::SemiPeriodUnset => write!(f, "semi-period not set"),
            Self::Disabled => write!(f, "dimmer is not enabled"),
            Self::RegistryFull => write!(f, "dimmer registry is full"),
            Self::Ledc(rc) => write!(f, "LEDC driver failed (rc={rc})"),
            Self::I2c(rc) => write!(f, "I2C transaction failed (rc={rc})"),
            Self::Timer(rc) => write!(f, "fire timer failed (rc={rc})"),
            Self::InvalidInput(what) => write!(f, "invalid input: {what}"),
            Self::Indeterminate => write!(f, "not computable at this duty cycle"),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, DimmerError>;
