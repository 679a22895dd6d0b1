//! Serializable diagnostic snapshots.
//!
//! [`DimmerReport`] is the JSON-shaped record exported per dimmer:
//! the full duty-cycle pipeline state, backend-specific detail where it
//! exists, and the harmonic spectrum. Harmonic entries that cannot be
//! computed are omitted from the serialized output rather than emitted as
//! NaN (which JSON cannot represent anyway).

use serde::Serialize;

/// Odd-harmonic magnitudes H1..H21 as percent of the fundamental.
/// `None` entries are skipped during serialization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarmonicsReport {
    #[serde(rename = "H1", skip_serializing_if = "Option::is_none")]
    pub h1: Option<f32>,
    #[serde(rename = "H3", skip_serializing_if = "Option::is_none")]
    pub h3: Option<f32>,
    #[serde(rename = "H5", skip_serializing_if = "Option::is_none")]
    pub h5: Option<f32>,
    #[serde(rename = "H7", skip_serializing_if = "Option::is_none")]
    pub h7: Option<f32>,
    #[serde(rename = "H9", skip_serializing_if = "Option::is_none")]
    pub h9: Option<f32>,
    #[serde(rename = "H11", skip_serializing_if = "Option::is_none")]
    pub h11: Option<f32>,
    #[serde(rename = "H13", skip_serializing_if = "Option::is_none")]
    pub h13: Option<f32>,
    #[serde(rename = "H15", skip_serializing_if = "Option::is_none")]
    pub h15: Option<f32>,
    #[serde(rename = "H17", skip_serializing_if = "Option::is_none")]
    pub h17: Option<f32>,
    #[serde(rename = "H19", skip_serializing_if = "Option::is_none")]
    pub h19: Option<f32>,
    #[serde(rename = "H21", skip_serializing_if = "Option::is_none")]
    pub h21: Option<f32>,
}

impl HarmonicsReport {
    /// Build from the 11 magnitudes produced by `calculate_harmonics`;
    /// NaN becomes an omitted key.
    pub fn from_magnitudes(magnitudes: &[f32; 11]) -> Self {
        let get = |i: usize| {
            let v = magnitudes[i];
            if v.is_nan() {
                None
            } else {
                Some(v)
            }
        };
        Self {
            h1: get(0),
            h3: get(1),
            h5: get(2),
            h7: get(3),
            h9: get(4),
            h11: get(5),
            h13: get(6),
            h15: get(7),
            h17: get(8),
            h19: get(9),
            h21: get(10),
        }
    }
}

/// JSON-shaped diagnostic record for one dimmer.
#[derive(Debug, Clone, Serialize)]
pub struct DimmerReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub enabled: bool,
    pub online: bool,
    /// "on" or "off".
    pub state: &'static str,
    pub semi_period: u16,
    pub duty_cycle: f32,
    pub duty_cycle_mapped: f32,
    pub duty_cycle_fire: f32,
    pub duty_cycle_limit: f32,
    pub duty_cycle_min: f32,
    pub duty_cycle_max: f32,
    pub power_lut: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firing_delay: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i2c_address: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,

    pub harmonics: HarmonicsReport,
}
