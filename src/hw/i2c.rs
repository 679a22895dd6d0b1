//! Minimal I2C master access for the DAC dimmer backend.
//!
//! The application owns bus setup: call [`init`] once per port before
//! enabling any DAC dimmer on it. On host/test every write is logged per
//! device address so tests can assert on the exact payloads.

use crate::error::{DimmerError, Result};

#[cfg(target_os = "espidf")]
const I2C_TIMEOUT_TICKS: u32 = 100;

/// Install the I2C master driver on `port`.
#[cfg(target_os = "espidf")]
pub fn init(port: u8, sda: i32, scl: i32, frequency_hz: u32) -> Result<()> {
    use esp_idf_svc::sys::*;

    let mut cfg = i2c_config_t {
        mode: i2c_mode_t_I2C_MODE_MASTER,
        sda_io_num: sda,
        scl_io_num: scl,
        sda_pullup_en: true,
        scl_pullup_en: true,
        ..Default::default()
    };
    cfg.__bindgen_anon_1.master.clk_speed = frequency_hz;

    // SAFETY: cfg is valid for the call; port is a hardware port number.
    unsafe {
        let rc = i2c_param_config(port as i2c_port_t, &cfg);
        if rc != ESP_OK {
            return Err(DimmerError::I2c(rc));
        }
        let rc = i2c_driver_install(port as i2c_port_t, i2c_mode_t_I2C_MODE_MASTER, 0, 0, 0);
        if rc != ESP_OK && rc != ESP_ERR_INVALID_STATE {
            return Err(DimmerError::I2c(rc));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init(_port: u8, _sda: i32, _scl: i32, _frequency_hz: u32) -> Result<()> {
    Ok(())
}

/// Write `bytes` to the device at `address`.
#[cfg(target_os = "espidf")]
pub fn write(port: u8, address: u8, bytes: &[u8]) -> Result<()> {
    use esp_idf_svc::sys::*;

    // SAFETY: buffer pointer/length pair is valid for the call.
    let rc = unsafe {
        i2c_master_write_to_device(
            port as i2c_port_t,
            address,
            bytes.as_ptr(),
            bytes.len(),
            I2C_TIMEOUT_TICKS,
        )
    };
    if rc != ESP_OK {
        return Err(DimmerError::I2c(rc));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn write(port: u8, address: u8, bytes: &[u8]) -> Result<()> {
    sim::record(port, address, bytes);
    Ok(())
}

/// Address-only probe: does a device ACK at `address`?
#[cfg(target_os = "espidf")]
pub fn probe(port: u8, address: u8) -> Result<()> {
    write(port, address, &[])
}

#[cfg(not(target_os = "espidf"))]
pub fn probe(_port: u8, _address: u8) -> Result<()> {
    Ok(())
}

// ── Host simulation ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::{Mutex, OnceLock};

    type WriteLog = Vec<(u8, u8, Vec<u8>)>;

    fn log() -> &'static Mutex<WriteLog> {
        static LOG: OnceLock<Mutex<WriteLog>> = OnceLock::new();
        LOG.get_or_init(|| Mutex::new(Vec::new()))
    }

    pub fn record(port: u8, address: u8, bytes: &[u8]) {
        log()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((port, address, bytes.to_vec()));
    }

    pub fn writes_to(address: u8) -> Vec<Vec<u8>> {
        log()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, a, _)| *a == address)
            .map(|(_, _, b)| b.clone())
            .collect()
    }
}

/// All payloads written to `address` so far (host only). Tests should use
/// a unique device address per test case.
#[cfg(not(target_os = "espidf"))]
pub fn sim_writes_to(address: u8) -> Vec<Vec<u8>> {
    sim::writes_to(address)
}
