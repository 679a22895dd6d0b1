//! PWM and DAC backend tests against the simulated peripherals, plus the
//! metric entry points through the public API.
//!
//! Pins 20-22 and I2C addresses 0x60-0x62 belong to this module.

use acdimmer::hw::{i2c, ledc};
use acdimmer::{DacRange, DacSku, Dimmer};

#[test]
fn pwm_writes_scaled_duty() {
    let mut d = Dimmer::pwm(20); // 12-bit default
    d.begin().unwrap();
    d.set_online(true);

    assert!(d.set_duty_cycle(0.5));
    assert_eq!(ledc::sim_duty_for_pin(20), Some(2048)); // round(0.5 * 4095)

    assert!(d.on());
    assert_eq!(ledc::sim_duty_for_pin(20), Some(4095));

    d.set_online(false);
    assert_eq!(ledc::sim_duty_for_pin(20), Some(0), "offline writes zero");
}

#[test]
fn pwm_respects_resolution() {
    let mut d = Dimmer::pwm_with(21, 25_000, 8);
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(1.0);
    assert_eq!(ledc::sim_duty_for_pin(21), Some(255));
}

#[test]
fn pwm_end_leaves_output_dark() {
    let mut d = Dimmer::pwm(22);
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.8);
    d.end();
    assert_eq!(ledc::sim_duty_for_pin(22), Some(0));
    assert!(!d.is_enabled());
}

#[test]
fn dac_configures_range_then_tracks_duty() {
    let mut d = Dimmer::dac(0, 0x60, DacSku::Gp8403, DacRange::Range0To10V, 0);
    d.begin().unwrap();
    d.set_online(true);

    d.set_duty_cycle(0.5);
    let writes = i2c::sim_writes_to(0x60);
    // Range config, power-off zero from begin, then the duty write.
    assert_eq!(writes[0], vec![0x01, 0x11]);
    assert_eq!(writes[1], vec![0x02, 0x00, 0x00]);
    // round(0.5 * 4095) = 2048, left-aligned: 2048 << 4 = 0x8000.
    assert_eq!(writes.last().unwrap(), &vec![0x02, 0x00, 0x80]);
}

#[test]
fn dac_dual_channel_writes_both_outputs() {
    let mut d = Dimmer::dac(0, 0x61, DacSku::Gp8413, DacRange::Range0To5V, 2);
    d.begin().unwrap();
    d.set_online(true);

    d.set_duty_cycle(1.0);
    let writes = i2c::sim_writes_to(0x61);
    assert_eq!(writes[0], vec![0x01, 0x00]);
    // 15-bit full scale 32767, left-aligned: 32767 << 1 = 0xFFFE.
    assert_eq!(writes.last().unwrap(), &vec![0x02, 0xfe, 0xff, 0xfe, 0xff]);
}

#[test]
fn dac_goes_dark_when_offline() {
    let mut d = Dimmer::dac(0, 0x62, DacSku::Gp8211s, DacRange::Range0To10V, 0);
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.7);

    d.set_online(false);
    let writes = i2c::sim_writes_to(0x62);
    assert_eq!(writes.last().unwrap(), &vec![0x02, 0x00, 0x00]);
}

#[test]
fn metrics_through_the_dimmer_api() {
    let mut d = Dimmer::virtual_dimmer();
    d.begin().unwrap();
    d.set_online(true);
    d.set_duty_cycle(0.5);

    let m = d.calculate_metrics(230.0, 50.0).unwrap();
    assert!((m.power - 529.0).abs() < 0.5);
    assert!((m.power_factor - 0.7071).abs() < 1e-4);
    assert!((m.voltage - 162.63).abs() < 0.05);
    assert!((m.thdi - 100.0).abs() < 0.01);
}

#[test]
fn harmonics_anchor_is_exact_across_the_range() {
    let mut d = Dimmer::virtual_dimmer();
    d.begin().unwrap();
    d.set_online(true);

    let mut h = [0.0f32; 6];
    for duty in [0.1, 0.3, 0.5, 0.7, 0.9] {
        d.set_duty_cycle(duty);
        d.calculate_harmonics(&mut h).unwrap();
        assert_eq!(h[0], 100.0, "H1 anchor at duty {duty}");
    }
}
