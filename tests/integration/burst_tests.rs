//! Burst engine scheduling tests.
//!
//! The periodic half-cycle alarm is driven by `sim_advance(semi_period)`,
//! one call per half-cycle; the pin level after each call is that
//! half-cycle's conduction decision.
//!
//! Pins 10-15 belong to this module, one per test.

use acdimmer::config::SEMI_PERIOD_50HZ_US;
use acdimmer::hw::gpio::{sim_level, sim_write_count};
use acdimmer::{BurstEngine, Dimmer, BURST_WINDOW};

use crate::sim::burst_engine;

fn online_dimmer(engine: &'static BurstEngine, pin: i32) -> Dimmer {
    engine.set_semi_period(SEMI_PERIOD_50HZ_US);
    let mut d = Dimmer::burst(engine, pin);
    d.begin().unwrap();
    d.set_online(true);
    d
}

/// Collect the conduction pattern of `halves` consecutive half-cycles.
fn collect(engine: &BurstEngine, pin: i32, halves: usize) -> Vec<bool> {
    (0..halves)
        .map(|_| {
            engine.sim_advance(SEMI_PERIOD_50HZ_US as u64);
            sim_level(pin)
        })
        .collect()
}

#[test]
fn half_duty_alternates_whole_cycles() {
    let engine = burst_engine();
    let mut d = online_dimmer(engine, 10);
    d.set_duty_cycle(0.5);

    let pattern = collect(engine, 10, BURST_WINDOW as usize);
    let on = pattern.iter().filter(|&&v| v).count();
    assert_eq!(on, 10);

    // Conduction switches in whole mains cycles: both halves of each pair
    // agree, so no DC component builds up.
    for p in 0..(BURST_WINDOW as usize / 2) {
        assert_eq!(pattern[2 * p], pattern[2 * p + 1], "pair {p} split a cycle");
    }
}

#[test]
fn odd_target_cancels_dc_over_two_windows() {
    let engine = burst_engine();
    let mut d = online_dimmer(engine, 11);
    d.set_duty_cycle(0.25); // 5 of 20 half-cycles

    let pattern = collect(engine, 11, 2 * BURST_WINDOW as usize);
    let on = pattern.iter().filter(|&&v| v).count();
    assert_eq!(on, 10, "two windows of 5 half-cycles each");

    let balance: i32 = pattern
        .iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(h, _)| if h % 2 == 0 { 1 } else { -1 })
        .sum();
    assert_eq!(balance, 0, "positive and negative half-cycles must balance");
}

#[test]
fn full_and_zero_duty_are_constant() {
    let engine = burst_engine();
    let mut d = online_dimmer(engine, 12);

    d.set_duty_cycle(1.0);
    assert!(collect(engine, 12, BURST_WINDOW as usize).iter().all(|&v| v));

    d.set_duty_cycle(0.0);
    assert!(collect(engine, 12, BURST_WINDOW as usize).iter().all(|&v| !v));
}

#[test]
fn zero_cross_resyncs_the_half_cycle_alarm() {
    let engine = burst_engine();
    let mut d = online_dimmer(engine, 13);
    d.set_duty_cycle(1.0);

    // Drift mid-way into a half-cycle, then a zero cross restarts the
    // counter: the next alarm must be a full semi-period away.
    engine.sim_advance(5_000);
    engine.handle_zero_cross();

    let writes = sim_write_count(13);
    engine.sim_advance(SEMI_PERIOD_50HZ_US as u64 - 1);
    assert_eq!(sim_write_count(13), writes, "alarm fired early after resync");
    engine.sim_advance(1);
    assert_eq!(sim_write_count(13), writes + 1);
}

#[test]
fn offline_burst_dimmer_stops_conducting() {
    let engine = burst_engine();
    let mut d = online_dimmer(engine, 14);
    d.set_duty_cycle(1.0);
    assert!(collect(engine, 14, 4).iter().all(|&v| v));

    d.set_online(false);
    assert!(collect(engine, 14, 4).iter().all(|&v| !v));

    d.set_online(true);
    assert!(collect(engine, 14, 4).iter().all(|&v| v));
}

#[test]
fn timer_lifecycle_follows_registration() {
    let engine = burst_engine();
    assert!(!engine.fire_timer_active());

    let mut d = online_dimmer(engine, 15);
    assert!(engine.fire_timer_active());
    assert_eq!(engine.registered(), 1);

    d.end();
    assert_eq!(engine.registered(), 0);
    assert!(!engine.fire_timer_active());
}
