/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Clock and supply sequencing around the register interface.
//!
//! The input clock must be running before the supply rails ramp, so power
//! comes up clock first and goes down in the exact reverse order.

use embedded_hal::blocking::{delay::DelayMs, i2c};
use embedded_hal::digital::v2::OutputPin;

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::registers;
use crate::stream::StreamState;
use crate::{Error, Imx385, StateError};

/// Settle window after the rails come up, waited twice
pub const POWER_SETTLE_MS: u32 = 10;

/// Frame rate / gain conversion select programmed at power on
const FR_FDG_SEL_DEFAULT: u8 = 0x02;

/// Board-level control of the sensor's input clock and supply rails
pub trait PowerControl {
    type Error;

    fn enable_clock(&mut self) -> Result<(), Self::Error>;
    fn disable_clock(&mut self) -> Result<(), Self::Error>;
    fn enable_supplies(&mut self) -> Result<(), Self::Error>;
    fn disable_supplies(&mut self) -> Result<(), Self::Error>;
}

/// Clock oscillator enable and supply load switch on two GPIO lines,
/// both active high
pub struct GpioPower<CLK, SUP> {
    clock: CLK,
    supplies: SUP,
}

impl<CLK, SUP> GpioPower<CLK, SUP> {
    pub fn new(clock: CLK, supplies: SUP) -> Self {
        Self { clock, supplies }
    }

    pub fn release(self) -> (CLK, SUP) {
        (self.clock, self.supplies)
    }
}

impl<CLK, SUP, PinE> PowerControl for GpioPower<CLK, SUP>
where
    CLK: OutputPin<Error = PinE>,
    SUP: OutputPin<Error = PinE>,
{
    type Error = PinE;

    fn enable_clock(&mut self) -> Result<(), PinE> {
        self.clock.set_high()
    }

    fn disable_clock(&mut self) -> Result<(), PinE> {
        self.clock.set_low()
    }

    fn enable_supplies(&mut self) -> Result<(), PinE> {
        self.supplies.set_high()
    }

    fn disable_supplies(&mut self) -> Result<(), PinE> {
        self.supplies.set_low()
    }
}

impl<I2C, D, P, CommE, PowerE> Imx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    /// Bring up clock and rails, then configure the data lanes.
    /// Anything already enabled is disabled again if a later step fails.
    pub fn power_on(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        if self.state.powered {
            return Ok(());
        }

        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 power on");

        self.power.enable_clock().map_err(Error::Power)?;
        if let Err(err) = self.power.enable_supplies() {
            let _ = self.power.disable_clock();
            return Err(Error::Power(err));
        }

        self.regs.delay_ms(POWER_SETTLE_MS);
        self.regs.delay_ms(POWER_SETTLE_MS);

        if let Err(err) = self.set_data_lanes() {
            #[cfg(feature = "rttdebug")]
            rprintln!("imx385 lane setup failed, powering down");
            let _ = self.power.disable_supplies();
            let _ = self.power.disable_clock();
            return Err(err);
        }

        // fresh power cycle, nothing can still be held
        self.regs.clear_hold_latched();
        self.state.powered = true;
        Ok(())
    }

    /// Remove rails then clock. Refused while streaming.
    pub fn power_off(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        if !self.state.powered {
            return Ok(());
        }
        if self.state.stream != StreamState::Stopped {
            return Err(Error::State(StateError::Streaming));
        }

        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 power off");

        self.state.powered = false;
        let supplies = self.power.disable_supplies();
        let clock = self.power.disable_clock();
        supplies.and(clock).map_err(Error::Power)
    }

    fn set_data_lanes(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        let lanes = self.lanes.lane_register_value();

        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 configuring {} lanes", self.lanes.count());

        self.regs
            .write(registers::PHY_LANE_NUM, lanes)
            .map_err(Error::Comm)?;
        self.regs
            .write(registers::CSI_LANE_MODE, lanes)
            .map_err(Error::Comm)?;
        self.regs
            .write(registers::FR_FDG_SEL, FR_FDG_SEL_DEFAULT)
            .map_err(Error::Comm)
    }
}
