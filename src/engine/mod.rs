//! Firing engines shared by the hardware-timed dimmer backends.
//!
//! Both engines follow the same shape: a fixed-capacity slot registry
//! guarded by an interrupt-safe spinlock, a fire timer that exists exactly
//! while at least one dimmer is registered, and ISR bodies that only read
//! integers latched from foreground code.

pub mod burst;
pub mod firing;

pub use burst::{BurstEngine, BURST_WINDOW};
pub use firing::{FiringEngine, MAX_DIMMERS, PHASE_DELAY_MIN_US};

/// Index of a dimmer's slot in an engine registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotId(pub(crate) usize);
