//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below exercises a subsystem against the in-memory hardware
//! simulation. All tests run on the host (x86_64); no real hardware or
//! zero-cross detector is required. The mains is a synthetic stream of
//! `handle_zero_cross` calls and the fire timer is advanced manually.
//!
//! The simulated GPIO/LEDC/I2C state is process-global, so every test uses
//! its own pin numbers / device addresses (see the allocation notes in each
//! module).

#![cfg(not(target_os = "espidf"))]

mod burst_tests;
mod diagnostics_tests;
mod dimmer_api_tests;
mod firing_engine_tests;
mod sim;
