//! Phase-control firing engine timing tests.
//!
//! A test half-cycle looks like real operation: `handle_zero_cross(lead)`
//! plays the pulse-analyzer upcall `lead` microseconds before the true
//! zero crossing, then `sim_advance` moves the fire timer through the
//! half-cycle. Because the simulation is exact, edges can be asserted to
//! the microsecond: still low at `zc + delay - 1`, high at `zc + delay`.
//!
//! Pins 30-44 belong to this module, one set per test: the simulated
//! GPIO state is process-global and tests run in parallel.

use acdimmer::config::SEMI_PERIOD_50HZ_US;
use acdimmer::hw::gpio::{sim_level, sim_write_count};
use acdimmer::{Dimmer, DimmerError, FiringEngine, PHASE_DELAY_MIN_US};

use crate::sim::firing_engine;

/// Typical RobotDyn-style detector: pulse starts 300us before the zero.
const ZC_LEAD_US: u16 = 300;

fn online_dimmer(engine: &'static FiringEngine, pin: i32) -> Dimmer {
    engine.set_semi_period(SEMI_PERIOD_50HZ_US);
    let mut d = Dimmer::phase_control(engine, pin);
    d.begin().unwrap();
    d.set_online(true);
    d
}

/// Assert the pin rises exactly `delay` microseconds after the true zero
/// crossing of the current half-cycle.
fn assert_rises_at(engine: &FiringEngine, pin: i32, delay: u64) {
    engine.sim_advance(ZC_LEAD_US as u64 + delay - 1);
    assert!(!sim_level(pin), "pin {pin} rose early (before zc+{delay}us)");
    engine.sim_advance(1);
    assert!(sim_level(pin), "pin {pin} not high at zc+{delay}us");
}

#[test]
fn half_duty_fires_at_mid_half_cycle() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 30);
    d.set_duty_cycle(0.5);
    assert_eq!(d.firing_delay(), Some(5_000));

    engine.handle_zero_cross(ZC_LEAD_US);
    assert!(!sim_level(30), "gate must drop at the zero cross");
    assert_rises_at(engine, 30, 5_000);
}

#[test]
fn zero_duty_never_fires() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 31);
    d.set_duty_cycle(0.0);

    engine.handle_zero_cross(ZC_LEAD_US);
    engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);
    assert!(!sim_level(31));
}

#[test]
fn full_duty_raises_at_zero_cross_and_stays_high() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 32);
    d.set_duty_cycle(1.0);
    assert_eq!(d.firing_delay(), Some(0));

    engine.handle_zero_cross(ZC_LEAD_US);
    assert!(sim_level(32), "gate must be high from the zero-cross handler on");

    let writes = sim_write_count(32);
    engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);
    assert!(sim_level(32));
    assert_eq!(sim_write_count(32), writes, "no extra edges during the half-cycle");
}

#[test]
fn tiny_delay_clamps_to_gate_minimum() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 33);
    // Would fire 10us after the zero cross; hardware needs 90us.
    d.set_duty_cycle(0.999);
    assert_eq!(d.firing_delay(), Some(PHASE_DELAY_MIN_US));

    engine.handle_zero_cross(ZC_LEAD_US);
    assert_rises_at(engine, 33, PHASE_DELAY_MIN_US as u64);
}

#[test]
fn power_lut_half_duty_still_fires_mid_cycle() {
    // Half power is the symmetry point of the conduction curve, so the LUT
    // maps it (almost) onto the same mid-cycle firing point.
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 34);
    d.enable_power_lut(true, 0).unwrap();
    d.set_duty_cycle(0.5);

    let delay = d.firing_delay().unwrap();
    assert!((4_990..=5_010).contains(&delay), "delay = {delay}");
    assert!((d.duty_cycle_fire() - 0.5).abs() < 0.002);
}

#[test]
fn dimmers_fire_in_delay_order() {
    let engine = firing_engine();
    let mut early = online_dimmer(engine, 35);
    let mut late = online_dimmer(engine, 36);
    early.set_duty_cycle(0.7); // 3000us
    late.set_duty_cycle(0.3); // 7000us

    engine.handle_zero_cross(ZC_LEAD_US);
    assert!(!sim_level(35) && !sim_level(36));

    engine.sim_advance(ZC_LEAD_US as u64 + 3_000);
    assert!(sim_level(35), "early dimmer must have fired");
    assert!(!sim_level(36), "late dimmer must still be off");

    engine.sim_advance(4_000);
    assert!(sim_level(36), "late dimmer must fire at its own delay");
}

#[test]
fn zero_cross_already_passed_catches_up() {
    // lead == 0 means the handler ran exactly at the zero crossing; the
    // half-cycle must still fire, timed from handler entry.
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 37);
    d.set_duty_cycle(0.5);

    engine.handle_zero_cross(0);
    engine.sim_advance(4_999);
    assert!(!sim_level(37));
    engine.sim_advance(1);
    assert!(sim_level(37));
}

#[test]
fn duty_update_takes_effect_at_next_zero_cross() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 38);
    d.set_duty_cycle(0.5);

    engine.handle_zero_cross(ZC_LEAD_US);
    // Mid-cycle update: the armed alarm for this half-cycle is unchanged.
    d.set_duty_cycle(0.2); // 8000us next cycle
    assert_rises_at(engine, 38, 5_000);

    engine.handle_zero_cross(ZC_LEAD_US);
    assert_rises_at(engine, 38, 8_000);
}

#[test]
fn timer_lifecycle_follows_registration() {
    let engine = firing_engine();
    assert!(!engine.fire_timer_active());

    let mut d1 = online_dimmer(engine, 39);
    assert!(engine.fire_timer_active());
    assert_eq!(engine.registered(), 1);

    let mut d2 = online_dimmer(engine, 40);
    assert_eq!(engine.registered(), 2);

    d2.end();
    assert_eq!(engine.registered(), 1);
    assert!(engine.fire_timer_active());

    d1.end();
    assert_eq!(engine.registered(), 0);
    assert!(!engine.fire_timer_active());

    // The registry is reusable after draining.
    d1.begin().unwrap();
    assert!(engine.fire_timer_active());
    assert_eq!(engine.registered(), 1);
    d1.end();
}

#[test]
fn ended_dimmer_receives_no_more_edges() {
    let engine = firing_engine();
    let mut keep = online_dimmer(engine, 41);
    let mut gone = online_dimmer(engine, 42);
    keep.set_duty_cycle(0.5);
    gone.set_duty_cycle(0.5);

    engine.handle_zero_cross(ZC_LEAD_US);
    engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);

    gone.end();
    let writes = sim_write_count(42);

    for _ in 0..3 {
        engine.handle_zero_cross(ZC_LEAD_US);
        engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);
    }
    assert_eq!(sim_write_count(42), writes, "unregistered pin must not be driven");
    assert!(sim_level(41), "remaining dimmer keeps firing");
}

#[test]
fn invalid_pin_fails_begin_and_registers_nothing() {
    let engine = firing_engine();
    let mut d = Dimmer::phase_control(engine, 99);
    assert_eq!(d.begin(), Err(DimmerError::InvalidPin(99)));
    assert!(!d.is_enabled());
    assert_eq!(engine.registered(), 0);
    assert!(!engine.fire_timer_active());
}

#[test]
fn unknown_semi_period_inhibits_firing() {
    let engine = firing_engine();
    // Deliberately no set_semi_period.
    let mut d = Dimmer::phase_control(engine, 43);
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.5);

    engine.handle_zero_cross(ZC_LEAD_US);
    engine.sim_advance(20_000);
    assert!(!sim_level(43));
}

#[test]
fn offline_dimmer_is_held_low() {
    let engine = firing_engine();
    let mut d = online_dimmer(engine, 44);
    d.set_duty_cycle(1.0);
    engine.handle_zero_cross(ZC_LEAD_US);
    assert!(sim_level(44));

    d.set_online(false);
    assert_eq!(d.duty_cycle_fire(), 0.0);
    engine.handle_zero_cross(ZC_LEAD_US);
    engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);
    assert!(!sim_level(44), "offline dimmer must not conduct");

    d.set_online(true);
    engine.handle_zero_cross(ZC_LEAD_US);
    assert!(sim_level(44), "saved duty replays when back online");
}
