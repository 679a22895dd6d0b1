//! Diagnostic report serialization tests.
//!
//! Pins 16-17 belong to this module.

use acdimmer::config::SEMI_PERIOD_50HZ_US;
use acdimmer::Dimmer;

use crate::sim::firing_engine;

#[test]
fn virtual_report_has_core_fields_only() {
    let mut d = Dimmer::virtual_dimmer();
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.5);

    let json = serde_json::to_value(d.report()).unwrap();
    assert_eq!(json["type"], "virtual");
    assert_eq!(json["enabled"], true);
    assert_eq!(json["online"], true);
    assert_eq!(json["state"], "on");
    assert_eq!(json["duty_cycle"], 0.5);
    assert_eq!(json["duty_cycle_fire"], 0.5);
    assert_eq!(json["duty_cycle_limit"], 1.0);
    assert_eq!(json["power_lut"], false);

    // No backend-specific keys for a virtual dimmer.
    assert!(json.get("pin").is_none());
    assert!(json.get("sku").is_none());
    assert!(json.get("frequency").is_none());

    // A conducting dimmer reports at least the fundamental.
    assert_eq!(json["harmonics"]["H1"], 100.0);
}

#[test]
fn phase_control_report_includes_firing_detail() {
    let engine = firing_engine();
    engine.set_semi_period(SEMI_PERIOD_50HZ_US);
    let mut d = Dimmer::phase_control(engine, 16);
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.5);

    let json = serde_json::to_value(d.report()).unwrap();
    assert_eq!(json["type"], "phase-control");
    assert_eq!(json["pin"], 16);
    assert_eq!(json["semi_period"], 10_000);
    assert_eq!(json["firing_delay"], 5_000);
    assert_eq!(json["phase_angle"], 90.0);
    assert_eq!(json["harmonics"]["H1"], 100.0);
    assert!(json["harmonics"].get("H3").is_some());
}

#[test]
fn uncomputable_harmonics_are_omitted() {
    let engine = firing_engine();
    engine.set_semi_period(SEMI_PERIOD_50HZ_US);
    let mut d = Dimmer::phase_control(engine, 17);
    d.begin().unwrap();
    d.set_online(true);
    // Conduction so small the fundamental vanishes: every harmonic entry
    // is indeterminate and must be left out of the JSON.
    d.set_duty_cycle(0.0001);

    let json = serde_json::to_value(d.report()).unwrap();
    let harmonics = json["harmonics"].as_object().unwrap();
    assert!(harmonics.is_empty(), "harmonics = {harmonics:?}");
}

#[test]
fn off_dimmer_reports_off_state_and_zero_harmonics() {
    let mut d = Dimmer::virtual_dimmer();
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.0);

    let json = serde_json::to_value(d.report()).unwrap();
    assert_eq!(json["state"], "off");
    assert_eq!(json["harmonics"]["H1"], 0.0);
    assert_eq!(json["harmonics"]["H21"], 0.0);
}
