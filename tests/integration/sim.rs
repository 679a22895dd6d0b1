//! Shared helpers for driving the engines on the host.

use acdimmer::{BurstEngine, FiringEngine};

/// Engines must outlive their dimmers and their timer ISR context, so the
/// tests leak one per case, exactly what a firmware image does with its
/// single engine at boot.
pub fn firing_engine() -> &'static FiringEngine {
    Box::leak(Box::new(FiringEngine::new()))
}

pub fn burst_engine() -> &'static BurstEngine {
    Box::leak(Box::new(BurstEngine::new()))
}
