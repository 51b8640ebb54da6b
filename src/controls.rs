/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Imaging controls and their translation into register writes.
//!
//! Control values are always stored, but only reach the sensor while it
//! is powered. Whatever is stored is replayed in full on stream start.
//!
//! Exposure is programmed relative to VMAX, so every vertical blank change
//! narrows or widens the exposure range and rewrites the exposure register.

use embedded_hal::blocking::{delay::DelayMs, i2c};

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::modes::{black_level, LaneCount, Mode};
use crate::power::PowerControl;
use crate::registers::{self, pgctrl_mode, PGCTRL_REGEN, PGCTRL_THRU};
use crate::stream::StreamState;
use crate::timing::{self, EXPOSURE_MIN};
use crate::{Error, Imx385};

pub const ANALOG_GAIN_MAX: i64 = 300;
pub const DIGITAL_GAIN_MAX: i64 = 420;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlId {
    AnalogGain,
    DigitalGain,
    Exposure,
    HorizontalBlank,
    VerticalBlank,
    TestPattern,
    /// Index into the lane count's link frequency table
    LinkFrequency,
    PixelRate,
}

impl ControlId {
    pub const ALL: [ControlId; 8] = [
        ControlId::AnalogGain,
        ControlId::DigitalGain,
        ControlId::Exposure,
        ControlId::HorizontalBlank,
        ControlId::VerticalBlank,
        ControlId::TestPattern,
        ControlId::LinkFrequency,
        ControlId::PixelRate,
    ];

    /// Derived from mode and format, never set directly
    pub fn is_read_only(self) -> bool {
        matches!(self, ControlId::LinkFrequency | ControlId::PixelRate)
    }
}

/// A control's current value and its allowed range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub value: i64,
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

impl Control {
    const fn new(min: i64, max: i64, default: i64) -> Self {
        Self {
            value: default,
            min,
            max,
            default,
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Change the range, pulling the current value inside it
    fn modify_range(&mut self, min: i64, max: i64, default: i64) {
        self.min = min;
        self.max = max;
        self.default = default;
        self.value = self.value.clamp(min, max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    Disabled = 0,
    SequencePattern1 = 1,
    HorizontalColorBar = 2,
    VerticalColorBar = 3,
    SequencePattern2 = 4,
    GradationPattern1 = 5,
    GradationPattern2 = 6,
    Toggle000555 = 7,
}

impl TestPattern {
    pub const ALL: [TestPattern; 8] = [
        TestPattern::Disabled,
        TestPattern::SequencePattern1,
        TestPattern::HorizontalColorBar,
        TestPattern::VerticalColorBar,
        TestPattern::SequencePattern2,
        TestPattern::GradationPattern1,
        TestPattern::GradationPattern2,
        TestPattern::Toggle000555,
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Menu label
    pub const fn name(self) -> &'static str {
        match self {
            TestPattern::Disabled => "Disabled",
            TestPattern::SequencePattern1 => "Sequence Pattern 1",
            TestPattern::HorizontalColorBar => "Horizontal Color-bar Chart",
            TestPattern::VerticalColorBar => "Vertical Color-bar Chart",
            TestPattern::SequencePattern2 => "Sequence Pattern 2",
            TestPattern::GradationPattern1 => "Gradation Pattern 1",
            TestPattern::GradationPattern2 => "Gradation Pattern 2",
            TestPattern::Toggle000555 => "000/555h Toggle Pattern",
        }
    }
}

/// The stored value of every control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub analog_gain: Control,
    pub digital_gain: Control,
    pub exposure: Control,
    pub hblank: Control,
    pub vblank: Control,
    pub test_pattern: Control,
    pub link_frequency: Control,
    pub pixel_rate: Control,
}

impl Controls {
    pub(crate) fn new(lanes: LaneCount, mode: &Mode, bits_per_pixel: u8) -> Self {
        let (hblank_min, hblank_max) = timing::hblank_range(mode);
        let hblank_default = i64::from(mode.hmax) - i64::from(mode.width);
        let (vblank_min, vblank_max) = timing::vblank_range(mode);
        let exposure_max = timing::exposure_max(mode, vblank_min);
        let link_freq_max = timing::link_frequencies(lanes).len() as i64 - 1;

        let mut controls = Self {
            analog_gain: Control::new(0, ANALOG_GAIN_MAX, 0),
            digital_gain: Control::new(0, DIGITAL_GAIN_MAX, 0),
            exposure: Control::new(EXPOSURE_MIN, exposure_max, exposure_max),
            hblank: Control::new(hblank_min, hblank_max, hblank_default),
            vblank: Control::new(vblank_min, vblank_max, vblank_min),
            test_pattern: Control::new(0, TestPattern::ALL.len() as i64 - 1, 0),
            link_frequency: Control::new(0, link_freq_max, 0),
            pixel_rate: Control::new(1, i64::from(i32::MAX), 1),
        };
        controls.update_telemetry(lanes, mode, bits_per_pixel);
        controls
    }

    pub fn get(&self, id: ControlId) -> &Control {
        match id {
            ControlId::AnalogGain => &self.analog_gain,
            ControlId::DigitalGain => &self.digital_gain,
            ControlId::Exposure => &self.exposure,
            ControlId::HorizontalBlank => &self.hblank,
            ControlId::VerticalBlank => &self.vblank,
            ControlId::TestPattern => &self.test_pattern,
            ControlId::LinkFrequency => &self.link_frequency,
            ControlId::PixelRate => &self.pixel_rate,
        }
    }

    /// Recompute mode-dependent ranges, keeping stored values where they fit
    pub(crate) fn update_for_mode(
        &mut self,
        lanes: LaneCount,
        mode: &Mode,
        bits_per_pixel: u8,
    ) {
        let (min, max) = timing::hblank_range(mode);
        let default = i64::from(mode.hmax) - i64::from(mode.width);
        self.hblank.modify_range(min, max, default);

        let (min, max) = timing::vblank_range(mode);
        self.vblank.modify_range(min, max, min);

        let exposure_max = timing::exposure_max(mode, self.vblank.value);
        self.exposure
            .modify_range(EXPOSURE_MIN, exposure_max, exposure_max);

        self.update_telemetry(lanes, mode, bits_per_pixel);
    }

    fn update_telemetry(&mut self, lanes: LaneCount, mode: &Mode, bits_per_pixel: u8) {
        self.link_frequency.value = mode.link_freq_index as i64;
        let rate = timing::pixel_rate(lanes, mode.link_freq_index, bits_per_pixel);
        self.pixel_rate.value = i64::try_from(rate).unwrap_or(i64::MAX);
    }
}

/// Control coordinator
impl<I2C, D, P, CommE, PowerE> Imx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    pub fn control(&self, id: ControlId) -> Control {
        *self.state.controls.get(id)
    }

    pub fn controls(&self) -> &crate::Controls {
        &self.state.controls
    }

    /// Set a control by id
    pub fn set_control(
        &mut self,
        id: ControlId,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        match id {
            ControlId::AnalogGain => self.set_analog_gain(value),
            ControlId::DigitalGain => self.set_digital_gain(value),
            ControlId::Exposure => self.set_exposure(value),
            ControlId::HorizontalBlank => self.set_horizontal_blank(value),
            ControlId::VerticalBlank => self.set_vertical_blank(value),
            ControlId::TestPattern => {
                self.check_range(id, value)?;
                match TestPattern::from_index(value) {
                    Some(pattern) => self.set_test_pattern(pattern),
                    None => Err(self.out_of_range(id, value)),
                }
            }
            ControlId::LinkFrequency | ControlId::PixelRate => {
                Err(Error::ReadOnly(id))
            }
        }
    }

    pub fn set_analog_gain(
        &mut self,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.check_range(ControlId::AnalogGain, value)?;
        if self.begin_write()? {
            self.write_gain(value + self.state.controls.digital_gain.value)?;
        }
        self.state.controls.analog_gain.value = value;
        Ok(())
    }

    pub fn set_digital_gain(
        &mut self,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.check_range(ControlId::DigitalGain, value)?;
        if self.begin_write()? {
            self.write_gain(self.state.controls.analog_gain.value + value)?;
        }
        self.state.controls.digital_gain.value = value;
        Ok(())
    }

    /// Exposure in lines, bounded by VMAX - 2
    pub fn set_exposure(
        &mut self,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.check_range(ControlId::Exposure, value)?;
        if self.begin_write()? {
            self.write_exposure(value)?;
        }
        self.state.controls.exposure.value = value;
        Ok(())
    }

    pub fn set_horizontal_blank(
        &mut self,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.check_range(ControlId::HorizontalBlank, value)?;
        if self.begin_write()? {
            self.write_hmax(timing::hmax(self.state.mode, value))?;
        }
        self.state.controls.hblank.value = value;
        Ok(())
    }

    /// Changing vertical blank moves VMAX, which also moves the exposure
    /// range and the meaning of the exposure register
    pub fn set_vertical_blank(
        &mut self,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.check_range(ControlId::VerticalBlank, value)?;
        if self.begin_write()? {
            self.apply_vertical_blank(value)
        } else {
            self.commit_vertical_blank(value);
            Ok(())
        }
    }

    pub fn set_test_pattern(
        &mut self,
        pattern: TestPattern,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if self.begin_write()? {
            self.write_test_pattern(pattern)?;
        }
        self.state.controls.test_pattern.value = i64::from(pattern.index());
        Ok(())
    }

    /// Write every stored control value to the sensor
    pub(crate) fn replay_controls(
        &mut self,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        let controls = &self.state.controls;
        let gain = controls.analog_gain.value + controls.digital_gain.value;
        let hblank = controls.hblank.value;
        let vblank = controls.vblank.value;
        let pattern = TestPattern::from_index(controls.test_pattern.value)
            .unwrap_or(TestPattern::Disabled);

        self.write_gain(gain)?;
        self.write_hmax(timing::hmax(self.state.mode, hblank))?;
        self.apply_vertical_blank(vblank)?;
        self.write_test_pattern(pattern)
    }

    /// Release a hold flag left latched by an earlier failure; a streaming
    /// sensor then gets every control rewritten
    pub(crate) fn resync_if_latched(
        &mut self,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if !self.regs.hold_latched() {
            return Ok(());
        }
        self.regs.recover_hold().map_err(Error::Comm)?;
        if self.state.stream == StreamState::Streaming {
            self.replay_controls()?;
        }
        Ok(())
    }

    pub(crate) fn write_hmax(
        &mut self,
        hmax: u32,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        let [low, high, _, _] = hmax.to_le_bytes();
        self.regs
            .write(registers::HMAX_LOW, low)
            .map_err(Error::Comm)?;
        self.regs
            .write(registers::HMAX_HIGH, high)
            .map_err(Error::Comm)
    }

    /// True when the write should go to the sensor now
    fn begin_write(&mut self) -> Result<bool, crate::Error<CommE, PowerE>> {
        if !self.state.powered {
            return Ok(false);
        }
        self.resync_if_latched()?;
        Ok(true)
    }

    fn check_range(
        &self,
        id: ControlId,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if id.is_read_only() {
            return Err(Error::ReadOnly(id));
        }
        if self.state.controls.get(id).contains(value) {
            Ok(())
        } else {
            Err(self.out_of_range(id, value))
        }
    }

    fn out_of_range(&self, id: ControlId, value: i64) -> crate::Error<CommE, PowerE> {
        let control = self.state.controls.get(id);
        Error::OutOfRange {
            id,
            value,
            min: control.min,
            max: control.max,
        }
    }

    fn write_gain(&mut self, gain: i64) -> Result<(), crate::Error<CommE, PowerE>> {
        let value = u32::try_from(gain).unwrap_or(0);
        self.regs
            .buffered_write(registers::GAIN, 2, value)
            .map_err(|err| {
                #[cfg(feature = "rttdebug")]
                rprintln!("imx385 unable to write gain");
                Error::Comm(err)
            })
    }

    fn write_exposure(
        &mut self,
        exposure: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        let vblank = self.state.controls.vblank.value;
        let value = timing::exposure_register(self.state.mode, vblank, exposure);
        self.regs
            .buffered_write(registers::EXPOSURE_LOW, 3, value)
            .map_err(|err| {
                #[cfg(feature = "rttdebug")]
                rprintln!("imx385 unable to write exposure");
                Error::Comm(err)
            })
    }

    /// Store a vertical blank value and narrow the exposure range to match
    fn commit_vertical_blank(&mut self, vblank: i64) {
        let controls = &mut self.state.controls;
        controls.vblank.value = vblank;
        let exposure_max = timing::exposure_max(self.state.mode, vblank);
        controls
            .exposure
            .modify_range(EXPOSURE_MIN, exposure_max, exposure_max);
    }

    fn apply_vertical_blank(
        &mut self,
        vblank: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        let vmax = timing::vmax(self.state.mode, vblank);
        self.regs
            .buffered_write(registers::VMAX_LOW, 3, vmax)
            .map_err(|err| {
                #[cfg(feature = "rttdebug")]
                rprintln!("imx385 unable to write vmax");
                Error::Comm(err)
            })?;
        self.commit_vertical_blank(vblank);

        // the exposure register is relative to VMAX, rewrite it so the
        // stored exposure and the sensor agree
        let exposure = self.state.controls.exposure.value;
        self.write_exposure(exposure)
    }

    fn write_test_pattern(
        &mut self,
        pattern: TestPattern,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        if pattern == TestPattern::Disabled {
            self.regs
                .write(registers::PGCTRL, 0x00)
                .map_err(Error::Comm)?;
            self.regs.settle();
            self.regs
                .write(
                    registers::BLKLEVEL_LOW,
                    black_level(self.state.bits_per_pixel),
                )
                .map_err(Error::Comm)?;
            self.regs
                .write(registers::BLKLEVEL_HIGH, 0x00)
                .map_err(Error::Comm)
        } else {
            self.regs
                .write(registers::BLKLEVEL_LOW, 0x00)
                .map_err(Error::Comm)?;
            self.regs
                .write(registers::BLKLEVEL_HIGH, 0x00)
                .map_err(Error::Comm)?;
            self.regs.settle();
            self.regs
                .write(
                    registers::PGCTRL,
                    PGCTRL_REGEN | PGCTRL_THRU | pgctrl_mode(pattern.index()),
                )
                .map_err(Error::Comm)
        }
    }
}
