//! I2C DAC backend for voltage regulators driven by a 0-5 V / 0-10 V
//! analog signal, using the GP8xxx family of I2C DAC modules.
//!
//! The application installs the I2C master driver ([`crate::hw::i2c::init`])
//! before enabling a DAC dimmer; several dimmers can share one bus with
//! distinct device addresses or channels.

use heapless::Vec;
use log::{error, info};

use crate::duty::DutyState;
use crate::error::{DimmerError, Result};
use crate::hw::i2c;

/// Factory-default device address of the GP8xxx modules.
pub const DAC_DEFAULT_ADDRESS: u8 = 0x58;

/// Output-range configuration register.
const REG_RANGE: u8 = 0x01;
/// Channel-0 output data register; channel 1 follows at +2.
const REG_DATA: u8 = 0x02;

/// Supported DAC modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacSku {
    /// 1 channel, 15-bit resolution.
    Gp8211s,
    /// 2 channels, 15-bit resolution.
    Gp8413,
    /// 2 channels, 12-bit resolution.
    Gp8403,
}

impl DacSku {
    pub fn resolution_bits(&self) -> u8 {
        match self {
            Self::Gp8211s | Self::Gp8413 => 15,
            Self::Gp8403 => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gp8211s => "GP8211S",
            Self::Gp8413 => "GP8413",
            Self::Gp8403 => "GP8403",
        }
    }
}

/// Output voltage span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacRange {
    Range0To5V,
    Range0To10V,
}

impl DacRange {
    fn config_byte(&self) -> u8 {
        // One nibble per channel.
        match self {
            Self::Range0To5V => 0x00,
            Self::Range0To10V => 0x11,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Range0To5V => "0-5V",
            Self::Range0To10V => "0-10V",
        }
    }
}

pub struct DacBackend {
    port: u8,
    address: u8,
    sku: DacSku,
    range: DacRange,
    /// 0 or 1 selects one output; 2 drives both.
    channel: u8,
    ready: bool,
}

impl DacBackend {
    pub fn new(port: u8, address: u8, sku: DacSku, range: DacRange, channel: u8) -> Self {
        Self {
            port,
            address,
            sku,
            range,
            channel,
            ready: false,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        if self.channel > 2 {
            return Err(DimmerError::InvalidInput("dac channel"));
        }
        if let Err(e) = i2c::probe(self.port, self.address) {
            error!(
                "No DAC at address {:#04x} on I2C port {}",
                self.address, self.port
            );
            return Err(e);
        }
        info!(
            "Enable DAC dimmer {} at {:#04x} channel {} ({})",
            self.sku.name(),
            self.address,
            self.channel,
            self.range.name()
        );
        i2c::write(self.port, self.address, &[REG_RANGE, self.range.config_byte()])?;
        self.send_duty(0)?;
        self.ready = true;
        Ok(())
    }

    pub fn end(&mut self) {
        if self.ready {
            info!("Disable DAC dimmer at {:#04x}", self.address);
            let _ = self.send_duty(0);
            self.ready = false;
        }
    }

    pub fn apply(&mut self, state: &DutyState) -> bool {
        if !self.ready {
            return false;
        }
        let duty = if state.online {
            let max = (1u32 << self.sku.resolution_bits()) - 1;
            (state.fire() * max as f32).round() as u16
        } else {
            0
        };
        self.send_duty(duty).is_ok()
    }

    /// Write a raw duty word. Data is left-aligned to 16 bits the way the
    /// GP8xxx parts expect (12-bit parts shift by 4, 15-bit parts by 1).
    fn send_duty(&self, duty: u16) -> Result<()> {
        let data = match self.sku.resolution_bits() {
            12 => duty << 4,
            _ => duty << 1,
        };
        let lo = (data & 0xff) as u8;
        let hi = (data >> 8) as u8;

        let mut frame: Vec<u8, 5> = Vec::new();
        match self.channel {
            2 => {
                // Both channels in one transaction, starting at channel 0.
                let _ = frame.extend_from_slice(&[REG_DATA, lo, hi, lo, hi]);
            }
            ch => {
                let _ = frame.extend_from_slice(&[REG_DATA + 2 * ch, lo, hi]);
            }
        }
        i2c::write(self.port, self.address, &frame)
    }

    pub fn sku(&self) -> DacSku {
        self.sku
    }

    pub fn range(&self) -> DacRange {
        self.range
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn resolution_bits(&self) -> u8 {
        self.sku.resolution_bits()
    }
}
