/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Recording bus, delay and pins for testing without hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::blocking::{delay::DelayMs, i2c};
use embedded_hal::digital::v2::OutputPin;

use crate::config::Config;
use crate::power::GpioPower;
use crate::timing::{LINK_FREQ_2LANES, LINK_FREQ_4LANES};
use crate::Imx385;

/// Everything the driver did, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write(u16, u8),
    /// A write that was attempted and rejected by the bus
    Failed(u16, u8),
    Read(u16),
    Delay(u32),
    Clock(bool),
    Supplies(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Clock,
    Supplies,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    address: u16,
    value: Option<u8>,
    once: bool,
}

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    registers: HashMap<u16, u8>,
    faults: Vec<Fault>,
    failing_lines: Vec<Line>,
}

/// Shared state behind every mock handed to the driver
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<Mutex<Inner>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn i2c(&self) -> MockI2c {
        MockI2c { bus: self.clone() }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { bus: self.clone() }
    }

    pub fn pin(&self, line: Line) -> MockPin {
        MockPin {
            bus: self.clone(),
            line,
        }
    }

    pub fn power(&self) -> GpioPower<MockPin, MockPin> {
        GpioPower::new(self.pin(Line::Clock), self.pin(Line::Supplies))
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner().events.clone()
    }

    /// Successful register writes only
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.inner()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Write(address, value) => Some((*address, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.inner().events.clear();
    }

    /// Last value successfully written to `address`
    pub fn register(&self, address: u16) -> Option<u8> {
        self.inner().registers.get(&address).copied()
    }

    pub fn fail_next_write_to(&self, address: u16) {
        self.inner().faults.push(Fault {
            address,
            value: None,
            once: true,
        });
    }

    pub fn fail_writes_of(&self, address: u16, value: u8) {
        self.inner().faults.push(Fault {
            address,
            value: Some(value),
            once: false,
        });
    }

    pub fn fail_line(&self, line: Line) {
        self.inner().failing_lines.push(line);
    }

    pub fn clear_faults(&self) {
        let mut inner = self.inner();
        inner.faults.clear();
        inner.failing_lines.clear();
    }
}

pub struct MockI2c {
    bus: MockBus,
}

impl i2c::Write for MockI2c {
    type Error = MockError;

    fn write(&mut self, _address: u8, bytes: &[u8]) -> Result<(), MockError> {
        let (address, value) = match bytes {
            [high, low, value] => (u16::from_be_bytes([*high, *low]), *value),
            _ => return Err(MockError),
        };
        let mut inner = self.bus.inner();
        let fault = inner.faults.iter().position(|fault| {
            fault.address == address
                && fault.value.map_or(true, |expected| expected == value)
        });
        if let Some(index) = fault {
            if inner.faults[index].once {
                inner.faults.remove(index);
            }
            inner.events.push(Event::Failed(address, value));
            return Err(MockError);
        }
        inner.events.push(Event::Write(address, value));
        inner.registers.insert(address, value);
        Ok(())
    }
}

impl i2c::WriteRead for MockI2c {
    type Error = MockError;

    fn write_read(
        &mut self,
        _address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), MockError> {
        let address = match bytes {
            [high, low] => u16::from_be_bytes([*high, *low]),
            _ => return Err(MockError),
        };
        let mut inner = self.bus.inner();
        inner.events.push(Event::Read(address));
        let value = inner.registers.get(&address).copied().unwrap_or(0);
        buffer.fill(value);
        Ok(())
    }
}

pub struct MockDelay {
    bus: MockBus,
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.bus.inner().events.push(Event::Delay(ms));
    }
}

pub struct MockPin {
    bus: MockBus,
    line: Line,
}

impl MockPin {
    fn set(&mut self, level: bool) -> Result<(), MockError> {
        let mut inner = self.bus.inner();
        if inner.failing_lines.contains(&self.line) {
            return Err(MockError);
        }
        inner.events.push(match self.line {
            Line::Clock => Event::Clock(level),
            Line::Supplies => Event::Supplies(level),
        });
        Ok(())
    }
}

impl OutputPin for MockPin {
    type Error = MockError;

    fn set_low(&mut self) -> Result<(), MockError> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), MockError> {
        self.set(true)
    }
}

pub type MockSensor = Imx385<MockI2c, MockDelay, GpioPower<MockPin, MockPin>>;

const ALL_LINK_FREQS: [u64; 4] = [
    LINK_FREQ_2LANES[0],
    LINK_FREQ_2LANES[1],
    LINK_FREQ_4LANES[0],
    LINK_FREQ_4LANES[1],
];

/// An attached but unpowered sensor
pub fn sensor(lanes: u8) -> (MockSensor, MockBus) {
    let bus = MockBus::new();
    let config = Config::new(lanes, &ALL_LINK_FREQS);
    let sensor = Imx385::new(bus.i2c(), bus.delay(), bus.power(), &config)
        .expect("valid configuration");
    (sensor, bus)
}

/// A powered sensor with the power-on traffic cleared from the log
pub fn powered_sensor(lanes: u8) -> (MockSensor, MockBus) {
    let (mut sensor, bus) = sensor(lanes);
    sensor.power_on().expect("power on");
    bus.clear();
    (sensor, bus)
}

/// A streaming sensor with the start-up traffic cleared from the log
pub fn streaming_sensor(lanes: u8) -> (MockSensor, MockBus) {
    let (mut sensor, bus) = powered_sensor(lanes);
    sensor.start_streaming().expect("start streaming");
    bus.clear();
    (sensor, bus)
}
