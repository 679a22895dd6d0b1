//! Hardware access layer.
//!
//! Every module here is dual-target: real ESP-IDF driver calls under
//! `target_os = "espidf"`, in-memory simulation on the host so the rest of
//! the crate is testable without hardware.

pub mod fire_timer;
pub mod gpio;
pub mod i2c;
pub mod ledc;
pub mod spinlock;
