/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/
#![cfg_attr(not(test), no_std)]

//! Configuration driver for the Sony IMX385 CMOS image sensor
//! This imaging sensor has multiple interfaces:
//! - Two-wire i2c for configuration registers (i2c)
//! - MIPI CSI-2 pixel data out, on 2 or 4 lanes
//! - external input clock (INCK) and three supply rails
//! This driver is concerned only with the i2c interface
//! and the clock/supply sequencing around it

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use embedded_hal::blocking::{delay::DelayMs, i2c};

pub mod config;
pub mod controls;
pub mod format;
pub mod modes;
pub mod power;
pub mod registers;
pub mod shared;
pub mod stream;
pub mod timing;

#[cfg(test)]
mod mock;

pub use config::{Config, ConfigError, DEFAULT_I2C_ADDRESS};
pub use controls::{Control, ControlId, Controls, TestPattern};
pub use format::{FormatWhence, FrameFormat, SelectionTarget};
pub use modes::{LaneCount, Mode, PixelFormat, Rect};
pub use power::{GpioPower, PowerControl};
pub use shared::SharedImx385;
pub use stream::StreamState;

use registers::RegisterBus;

/// Errors in this crate
#[derive(Debug, thiserror::Error)]
pub enum Error<CommE, PowerE> {
    /// Sensor communication error
    #[error("sensor communication error: {0:?}")]
    Comm(CommE),

    /// Clock or supply control error
    #[error("power control error: {0:?}")]
    Power(PowerE),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Operation not allowed in the current power or streaming state
    #[error("invalid state: {0}")]
    State(StateError),

    #[error("{id:?} value {value} outside [{min}, {max}]")]
    OutOfRange {
        id: ControlId,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{0:?} is read-only")]
    ReadOnly(ControlId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("sensor is not powered")]
    NotPowered,

    #[error("sensor is already streaming")]
    AlreadyStreaming,

    /// The active format cannot change while streaming
    #[error("sensor is busy streaming")]
    Busy,

    /// Power cannot be removed while streaming
    #[error("sensor must stop streaming first")]
    Streaming,
}

/// Everything that changes over the life of an attached sensor
pub(crate) struct DeviceState {
    bits_per_pixel: u8,
    mode: &'static Mode,
    format: FrameFormat,
    pending_mode: &'static Mode,
    pending_format: FrameFormat,
    controls: Controls,
    stream: StreamState,
    powered: bool,
}

impl DeviceState {
    /// Defaults to 1920x1080 and the first mode of the lane table
    fn new(lanes: LaneCount) -> Self {
        let format = PixelFormat::ALL[0];
        let mode = modes::find_nearest(lanes, 1920, 1080);
        let frame = FrameFormat {
            width: mode.width,
            height: mode.height,
            code: format,
        };
        Self {
            bits_per_pixel: format.bits_per_pixel(),
            mode,
            format: frame,
            pending_mode: mode,
            pending_format: frame,
            controls: Controls::new(lanes, mode, format.bits_per_pixel()),
            stream: StreamState::Stopped,
            powered: false,
        }
    }
}

/// Main driver struct
pub struct Imx385<I2C, D, P> {
    regs: RegisterBus<I2C, D>,
    power: P,
    lanes: LaneCount,
    state: DeviceState,
}

impl<I2C, D, P> Imx385<I2C, D, P> {
    /// Attach to a sensor. The configuration is validated before
    /// the driver is constructed; the sensor is left unpowered.
    pub fn new(
        i2c: I2C,
        delay: D,
        power: P,
        config: &Config<'_>,
    ) -> Result<Self, ConfigError> {
        let lanes = config.validate()?;

        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 using {} data lanes", lanes.count());

        Ok(Self {
            regs: RegisterBus::new(i2c, delay, config.address),
            power,
            lanes,
            state: DeviceState::new(lanes),
        })
    }

    /// Four lanes at DEFAULT_I2C_ADDRESS
    pub fn default(i2c: I2C, delay: D, power: P) -> Self {
        let lanes = LaneCount::Four;
        Self {
            regs: RegisterBus::new(i2c, delay, DEFAULT_I2C_ADDRESS),
            power,
            lanes,
            state: DeviceState::new(lanes),
        }
    }

    pub fn lanes(&self) -> LaneCount {
        self.lanes
    }

    pub fn bits_per_pixel(&self) -> u8 {
        self.state.bits_per_pixel
    }

    pub fn mode(&self) -> &'static Mode {
        self.state.mode
    }

    pub fn is_powered(&self) -> bool {
        self.state.powered
    }

    pub fn stream_state(&self) -> StreamState {
        self.state.stream
    }
}

impl<I2C, D, P, CommE, PowerE> Imx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    /// Read a u8 from a 16-bit address
    pub fn read_register(
        &mut self,
        reg: u16,
    ) -> Result<u8, crate::Error<CommE, PowerE>> {
        self.regs.read(reg).map_err(Error::Comm)
    }

    /// Write a u8 to a 16-bit address
    pub fn write_register(
        &mut self,
        reg: u16,
        val: u8,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.regs.write(reg, val).map_err(Error::Comm)
    }

    /// Software reset: every register returns to its power-on default.
    /// Mode and controls are reprogrammed by the next stream start.
    pub fn reset(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        self.require_powered()?;
        if self.state.stream != StreamState::Stopped {
            return Err(Error::State(StateError::Busy));
        }
        self.regs
            .write(registers::SW_RESET, 0x01)
            .map_err(Error::Comm)?;
        self.regs.settle();
        self.regs.clear_hold_latched();
        Ok(())
    }

    /// Detach: stop streaming, remove power and hand back the resources
    pub fn release(mut self) -> (I2C, D, P) {
        let _ = self.stop_streaming();
        let _ = self.power_off();
        let (i2c, delay) = self.regs.release();
        (i2c, delay, self.power)
    }

    pub(crate) fn require_powered(
        &self,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if self.state.powered {
            Ok(())
        } else {
            Err(Error::State(StateError::NotPowered))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{powered_sensor, sensor, streaming_sensor, Event, MockBus};
    use crate::timing::LINK_FREQ_4LANES;

    #[test]
    fn attach_defaults_to_first_mode() {
        let (sensor, bus) = sensor(4);
        assert_eq!(sensor.lanes(), LaneCount::Four);
        assert_eq!(sensor.bits_per_pixel(), 10);
        assert!(core::ptr::eq(sensor.mode(), &modes::MODES_4LANES[0]));
        assert!(!sensor.is_powered());
        assert_eq!(sensor.stream_state(), StreamState::Stopped);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn attach_refuses_bad_configuration() {
        let bus = MockBus::new();
        let config = Config::new(1, &LINK_FREQ_4LANES);
        let result = Imx385::new(bus.i2c(), bus.delay(), bus.power(), &config);
        assert!(matches!(result, Err(ConfigError::InvalidLaneCount(1))));
    }

    #[test]
    fn default_uses_four_lanes() {
        let bus = MockBus::new();
        let sensor = Imx385::default(bus.i2c(), bus.delay(), bus.power());
        assert_eq!(sensor.lanes(), LaneCount::Four);
    }

    #[test]
    fn reset_requires_power() {
        let (mut sensor, bus) = sensor(2);
        assert!(matches!(
            sensor.reset(),
            Err(Error::State(StateError::NotPowered))
        ));
        assert!(bus.events().is_empty());
    }

    #[test]
    fn reset_writes_and_settles() {
        let (mut sensor, bus) = powered_sensor(2);
        sensor.reset().unwrap();
        assert_eq!(
            bus.events(),
            vec![
                Event::Write(registers::SW_RESET, 0x01),
                Event::Delay(registers::SETTLE_MS)
            ]
        );
    }

    #[test]
    fn release_stops_and_powers_down() {
        let (sensor, bus) = streaming_sensor(4);
        let _ = sensor.release();
        let events = bus.events();
        assert!(events.contains(&Event::Write(registers::XMSTA, 0x01)));
        assert_eq!(
            &events[events.len() - 2..],
            &[Event::Supplies(false), Event::Clock(false)]
        );
    }

    #[test]
    fn errors_display() {
        let err: Error<(), ()> = Error::State(StateError::NotPowered);
        assert_eq!(err.to_string(), "invalid state: sensor is not powered");
        let err: Error<(), ()> = Error::OutOfRange {
            id: ControlId::AnalogGain,
            value: 301,
            min: 0,
            max: 300,
        };
        assert_eq!(err.to_string(), "AnalogGain value 301 outside [0, 300]");
    }
}
