/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Register map and byte-level register access.
//!
//! The IMX385 uses 16-bit register addresses holding 8-bit values.
//! Multi-byte timing and gain values are spread across consecutive
//! addresses, lowest-order byte first, and are only applied atomically
//! when bracketed by the register hold flag.

use embedded_hal::blocking::{delay::DelayMs, i2c};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

pub const STANDBY: u16 = 0x3000;
/// Register hold: while set, writes are latched but not applied
pub const REGHOLD: u16 = 0x3001;
/// Master start (XMSTA): 0 starts, 1 stops readout
pub const XMSTA: u16 = 0x3002;
pub const SW_RESET: u16 = 0x3003;
pub const FR_FDG_SEL: u16 = 0x3009;
pub const BLKLEVEL_LOW: u16 = 0x300a;
pub const BLKLEVEL_HIGH: u16 = 0x300b;
/// Gain, 2 bytes, buffered
pub const GAIN: u16 = 0x3014;
/// VMAX, 3 bytes, buffered
pub const VMAX_LOW: u16 = 0x3018;
pub const HMAX_LOW: u16 = 0x301b;
pub const HMAX_HIGH: u16 = 0x301c;
/// SHS1 exposure offset, 3 bytes, buffered
pub const EXPOSURE_LOW: u16 = 0x3020;
/// Pattern generator control
pub const PGCTRL: u16 = 0x308c;
pub const PHY_LANE_NUM: u16 = 0x3346;
pub const CSI_LANE_MODE: u16 = 0x337f;

pub const PGCTRL_REGEN: u8 = 1 << 0;
pub const PGCTRL_THRU: u8 = 1 << 1;

/// Pattern generator mode field, upper nibble of PGCTRL
pub const fn pgctrl_mode(n: u8) -> u8 {
    n << 4
}

/// Settle time after a register sequence or test pattern toggle
pub const SETTLE_MS: u32 = 10;
/// Settle time around standby transitions
pub const STANDBY_SETTLE_MS: u32 = 30;

/// One entry of an ordered register sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSetting {
    pub address: u16,
    pub value: u8,
}

impl RegisterSetting {
    pub const fn new(address: u16, value: u8) -> Self {
        Self { address, value }
    }
}

/// Owns the i2c bus and the delay source used for mandatory settle windows
pub struct RegisterBus<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    hold_latched: bool,
}

impl<I2C, D> RegisterBus<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            hold_latched: false,
        }
    }

    /// True when a hold-deassert write failed and the sensor may still
    /// be latching register updates
    pub fn hold_latched(&self) -> bool {
        self.hold_latched
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C, D, CommE> RegisterBus<I2C, D>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
{
    /// Read a u8 from a 16-bit address
    pub fn read(&mut self, reg: u16) -> Result<u8, CommE> {
        let cmd_buf = reg.to_be_bytes();
        let mut recv_buf = [0u8];
        self.i2c.write_read(self.address, &cmd_buf, &mut recv_buf)?;
        Ok(recv_buf[0])
    }

    /// Write a u8 to a 16-bit address
    pub fn write(&mut self, reg: u16, val: u8) -> Result<(), CommE> {
        let [high, low] = reg.to_be_bytes();
        self.i2c.write(self.address, &[high, low, val])
    }

    /// Write each setting in order, stopping at the first failure.
    /// Waits the settle window only once every setting has landed.
    pub fn write_sequence(
        &mut self,
        settings: &[RegisterSetting],
    ) -> Result<(), CommE> {
        for setting in settings {
            self.write(setting.address, setting.value)?;
        }
        self.settle();
        Ok(())
    }

    /// Write the low `byte_count` bytes of `value` to consecutive addresses
    /// starting at `base`, bracketed by the register hold flag.
    pub fn buffered_write(
        &mut self,
        base: u16,
        byte_count: u8,
        value: u32,
    ) -> Result<(), CommE> {
        self.write(REGHOLD, 0x01)?;

        let bytes = value.to_le_bytes();
        for (reg, byte) in (base..)
            .zip(bytes.iter())
            .take(usize::from(byte_count))
        {
            if let Err(err) = self.write(reg, *byte) {
                #[cfg(feature = "rttdebug")]
                rprintln!("imx385 buffered write failed at {:x}", reg);
                // best effort, a failure here is only recorded
                self.hold_latched = self.write(REGHOLD, 0x00).is_err();
                return Err(err);
            }
        }

        if let Err(err) = self.write(REGHOLD, 0x00) {
            self.hold_latched = true;
            return Err(err);
        }
        self.hold_latched = false;
        Ok(())
    }

    /// Deassert the hold flag left set by an earlier failed buffered write
    pub fn recover_hold(&mut self) -> Result<(), CommE> {
        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 releasing latched register hold");
        self.write(REGHOLD, 0x00)?;
        self.hold_latched = false;
        Ok(())
    }

    pub(crate) fn clear_hold_latched(&mut self) {
        self.hold_latched = false;
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn settle(&mut self) {
        self.delay_ms(SETTLE_MS);
    }
}
