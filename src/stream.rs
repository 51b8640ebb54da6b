/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Streaming state machine.

use embedded_hal::blocking::{delay::DelayMs, i2c};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::power::PowerControl;
use crate::registers::{self, STANDBY_SETTLE_MS};
use crate::{Error, Imx385, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Starting,
    Streaming,
    Stopping,
}

impl<I2C, D, P, CommE, PowerE> Imx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    pub fn set_stream(
        &mut self,
        enable: bool,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if enable {
            self.start_streaming()
        } else {
            self.stop_streaming()
        }
    }

    /// Program mode, format and every stored control, then leave standby.
    /// On failure the sensor is left stopped with whatever registers
    /// were already written.
    pub fn start_streaming(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        self.require_powered()?;
        if self.state.stream != StreamState::Stopped {
            return Err(Error::State(StateError::AlreadyStreaming));
        }

        self.state.stream = StreamState::Starting;
        match self.program_and_start() {
            Ok(()) => {
                #[cfg(feature = "rttdebug")]
                rprintln!(
                    "imx385 streaming {}x{}",
                    self.state.mode.width,
                    self.state.mode.height
                );
                self.state.stream = StreamState::Streaming;
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "rttdebug")]
                rprintln!("imx385 stream start failed");
                self.state.stream = StreamState::Stopped;
                Err(err)
            }
        }
    }

    /// Enter standby and stop the master. Both writes are always attempted.
    pub fn stop_streaming(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        if self.state.stream == StreamState::Stopped {
            return Ok(());
        }

        self.state.stream = StreamState::Stopping;
        let standby = self.regs.write(registers::STANDBY, 0x01);
        self.regs.delay_ms(STANDBY_SETTLE_MS);
        let master = self.regs.write(registers::XMSTA, 0x01);
        self.state.stream = StreamState::Stopped;

        #[cfg(feature = "rttdebug")]
        rprintln!("imx385 stream stopped");

        standby.and(master).map_err(Error::Comm)
    }

    fn program_and_start(&mut self) -> Result<(), crate::Error<CommE, PowerE>> {
        self.resync_if_latched()?;

        let mode = self.state.mode;
        self.regs
            .write_sequence(mode.registers)
            .map_err(Error::Comm)?;
        self.regs
            .write_sequence(self.state.format.code.registers())
            .map_err(Error::Comm)?;
        self.write_hmax(mode.hmax)?;
        self.replay_controls()?;

        self.regs
            .write(registers::STANDBY, 0x00)
            .map_err(Error::Comm)?;
        self.regs.delay_ms(STANDBY_SETTLE_MS);
        self.regs
            .write(registers::XMSTA, 0x00)
            .map_err(Error::Comm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ControlId, TestPattern};
    use crate::mock::{powered_sensor, sensor, streaming_sensor, Event};
    use crate::modes::PixelFormat;
    use crate::registers::*;

    #[test]
    fn start_requires_power() {
        let (mut sensor, bus) = sensor(4);
        assert!(matches!(
            sensor.start_streaming(),
            Err(Error::State(StateError::NotPowered))
        ));
        assert_eq!(sensor.stream_state(), StreamState::Stopped);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn start_twice_is_refused() {
        let (mut sensor, bus) = streaming_sensor(2);
        assert!(matches!(
            sensor.set_stream(true),
            Err(Error::State(StateError::AlreadyStreaming))
        ));
        assert_eq!(sensor.stream_state(), StreamState::Streaming);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn start_sequence_order() {
        let (mut sensor, bus) = powered_sensor(4);
        sensor.start_streaming().unwrap();
        assert_eq!(sensor.stream_state(), StreamState::Streaming);

        let events = bus.events();
        let mode_registers = sensor.mode().registers;
        let mode_len = mode_registers.len();
        let format_len = PixelFormat::Srggb10.registers().len();
        assert_eq!(
            events[0],
            Event::Write(mode_registers[0].address, mode_registers[0].value)
        );
        assert_eq!(events[mode_len], Event::Delay(SETTLE_MS));
        assert_eq!(events[mode_len + 1 + format_len], Event::Delay(SETTLE_MS));

        // 0x1130 = 4400 from the mode, then again from the stored hblank
        let hmax_at = mode_len + format_len + 2;
        assert_eq!(
            &events[hmax_at..hmax_at + 2],
            &[Event::Write(HMAX_LOW, 0x30), Event::Write(HMAX_HIGH, 0x11)]
        );

        let tail = &events[events.len() - 3..];
        assert_eq!(
            tail,
            &[
                Event::Write(STANDBY, 0x00),
                Event::Delay(STANDBY_SETTLE_MS),
                Event::Write(XMSTA, 0x00),
            ]
        );
        assert_eq!(bus.register(GAIN), Some(0x00));
        assert_eq!(bus.register(VMAX_LOW), Some(0x65));
        assert_eq!(bus.register(PGCTRL), Some(0x00));
    }

    #[test]
    fn failed_start_returns_to_stopped() {
        let (mut sensor, bus) = powered_sensor(4);
        bus.fail_next_write_to(XMSTA);
        assert!(matches!(sensor.start_streaming(), Err(Error::Comm(_))));
        assert_eq!(sensor.stream_state(), StreamState::Stopped);
        assert_eq!(
            bus.events().last(),
            Some(&Event::Failed(XMSTA, 0x00))
        );

        // nothing rolled back, a second start simply rewrites everything
        sensor.start_streaming().unwrap();
        assert_eq!(sensor.stream_state(), StreamState::Streaming);
    }

    #[test]
    fn stop_attempts_both_writes() {
        let (mut sensor, bus) = streaming_sensor(4);
        bus.fail_next_write_to(STANDBY);
        assert!(matches!(sensor.set_stream(false), Err(Error::Comm(_))));
        assert_eq!(
            bus.events(),
            vec![
                Event::Failed(STANDBY, 0x01),
                Event::Delay(STANDBY_SETTLE_MS),
                Event::Write(XMSTA, 0x01),
            ]
        );
        assert_eq!(sensor.stream_state(), StreamState::Stopped);
    }

    #[test]
    fn stop_when_stopped_does_nothing() {
        let (mut sensor, bus) = powered_sensor(2);
        sensor.stop_streaming().unwrap();
        assert!(bus.events().is_empty());
    }

    #[test]
    fn stored_controls_reach_sensor_on_start() {
        let (mut sensor, bus) = sensor(2);
        sensor.set_analog_gain(0x40).unwrap();
        sensor.set_vertical_blank(100).unwrap();
        sensor.set_exposure(500).unwrap();
        sensor.set_test_pattern(TestPattern::VerticalColorBar).unwrap();
        assert!(bus.events().is_empty());

        sensor.power_on().unwrap();
        sensor.start_streaming().unwrap();
        assert_eq!(bus.register(GAIN), Some(0x40));
        // 1080 + 100 = 1180 = 0x049c
        assert_eq!(bus.register(VMAX_LOW), Some(0x9c));
        assert_eq!(bus.register(VMAX_LOW + 1), Some(0x04));
        // 1180 - 500 - 1 = 679 = 0x02a7
        assert_eq!(bus.register(EXPOSURE_LOW), Some(0xa7));
        assert_eq!(bus.register(PGCTRL), Some(0x33));
        assert_eq!(sensor.control(ControlId::Exposure).value, 500);
    }
}
