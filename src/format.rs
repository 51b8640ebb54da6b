/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Frame format negotiation and selection rectangles.
//!
//! A `Try` request is negotiated against the mode table and remembered as
//! the pending format without touching the sensor. An `Active` request
//! commits mode and format; registers follow on the next stream start.

use embedded_hal::blocking::{delay::DelayMs, i2c};

use crate::modes::{self, PixelFormat, Rect};
use crate::power::PowerControl;
use crate::stream::StreamState;
use crate::{Error, Imx385, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub code: PixelFormat,
}

/// Which copy of the format a request reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatWhence {
    /// Scratch negotiation, no side effects
    Try,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    Crop,
    NativeSize,
    CropDefault,
    CropBounds,
}

/// Fixed frame interval as (numerator, denominator) seconds
pub const FRAME_INTERVAL: (u32, u32) = (1, 25);

const PIXEL_ARRAY: Rect = Rect {
    left: modes::PIXEL_ARRAY_LEFT,
    top: modes::PIXEL_ARRAY_TOP,
    width: modes::PIXEL_ARRAY_WIDTH,
    height: modes::PIXEL_ARRAY_HEIGHT,
};

impl<I2C, D, P> Imx385<I2C, D, P> {
    pub fn supported_formats(&self) -> &'static [PixelFormat] {
        &PixelFormat::ALL
    }

    /// Frame sizes the current lane configuration can produce
    pub fn frame_sizes(&self) -> impl Iterator<Item = (u32, u32)> {
        modes::modes(self.lanes)
            .iter()
            .map(|mode| (mode.width, mode.height))
    }

    pub fn frame_interval(&self) -> (u32, u32) {
        FRAME_INTERVAL
    }

    pub fn format(&self, which: FormatWhence) -> FrameFormat {
        match which {
            FormatWhence::Try => self.state.pending_format,
            FormatWhence::Active => self.state.format,
        }
    }

    pub fn selection(&self, target: SelectionTarget, which: FormatWhence) -> Rect {
        match target {
            SelectionTarget::Crop => match which {
                FormatWhence::Try => self.state.pending_mode.crop,
                FormatWhence::Active => self.state.mode.crop,
            },
            SelectionTarget::NativeSize => Rect {
                left: 0,
                top: 0,
                width: modes::NATIVE_WIDTH,
                height: modes::NATIVE_HEIGHT,
            },
            SelectionTarget::CropDefault | SelectionTarget::CropBounds => PIXEL_ARRAY,
        }
    }
}

impl<I2C, D, P, CommE, PowerE> Imx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    /// Negotiate `request` against the mode table and store the result.
    /// Returns the format actually selected.
    pub fn set_format(
        &mut self,
        request: FrameFormat,
        which: FormatWhence,
    ) -> Result<FrameFormat, crate::Error<CommE, PowerE>> {
        let mode = modes::find_nearest(self.lanes, request.width, request.height);
        let format = FrameFormat {
            width: mode.width,
            height: mode.height,
            code: request.code,
        };

        match which {
            FormatWhence::Try => {
                self.state.pending_mode = mode;
                self.state.pending_format = format;
            }
            FormatWhence::Active => {
                if self.state.stream != StreamState::Stopped {
                    return Err(Error::State(StateError::Busy));
                }
                let bits_per_pixel = format.code.bits_per_pixel();
                self.state.mode = mode;
                self.state.format = format;
                self.state.bits_per_pixel = bits_per_pixel;
                self.state
                    .controls
                    .update_for_mode(self.lanes, mode, bits_per_pixel);
            }
        }
        Ok(format)
    }
}
