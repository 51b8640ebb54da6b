/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Lock-guarded driver handle for sharing one sensor between contexts.
//!
//! Every entry point takes the lock for its whole duration, including the
//! settle delays, so register sequences from different callers never
//! interleave.

use embedded_hal::blocking::{delay::DelayMs, i2c};
use spin::Mutex;

use crate::controls::{Control, ControlId};
use crate::format::{FormatWhence, FrameFormat, SelectionTarget};
use crate::modes::Rect;
use crate::power::PowerControl;
use crate::stream::StreamState;
use crate::Imx385;

pub struct SharedImx385<I2C, D, P> {
    inner: Mutex<Imx385<I2C, D, P>>,
}

impl<I2C, D, P> SharedImx385<I2C, D, P> {
    pub fn new(sensor: Imx385<I2C, D, P>) -> Self {
        Self {
            inner: Mutex::new(sensor),
        }
    }

    /// Run `f` with exclusive access to the driver
    pub fn with<R>(&self, f: impl FnOnce(&mut Imx385<I2C, D, P>) -> R) -> R {
        let mut sensor = self.inner.lock();
        f(&mut sensor)
    }

    pub fn into_inner(self) -> Imx385<I2C, D, P> {
        self.inner.into_inner()
    }

    pub fn format(&self, which: FormatWhence) -> FrameFormat {
        self.inner.lock().format(which)
    }

    pub fn selection(&self, target: SelectionTarget, which: FormatWhence) -> Rect {
        self.inner.lock().selection(target, which)
    }

    pub fn stream_state(&self) -> StreamState {
        self.inner.lock().stream_state()
    }
}

impl<I2C, D, P, CommE, PowerE> SharedImx385<I2C, D, P>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32>,
    P: PowerControl<Error = PowerE>,
{
    pub fn control(&self, id: ControlId) -> Control {
        self.inner.lock().control(id)
    }

    pub fn set_control(
        &self,
        id: ControlId,
        value: i64,
    ) -> Result<(), crate::Error<CommE, PowerE>> {
        self.inner.lock().set_control(id, value)
    }

    pub fn set_format(
        &self,
        request: FrameFormat,
        which: FormatWhence,
    ) -> Result<FrameFormat, crate::Error<CommE, PowerE>> {
        self.inner.lock().set_format(request, which)
    }

    pub fn set_stream(&self, enable: bool) -> Result<(), crate::Error<CommE, PowerE>> {
        self.inner.lock().set_stream(enable)
    }

    pub fn power_on(&self) -> Result<(), crate::Error<CommE, PowerE>> {
        self.inner.lock().power_on()
    }

    pub fn power_off(&self) -> Result<(), crate::Error<CommE, PowerE>> {
        self.inner.lock().power_off()
    }
}
