/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Attach-time configuration, normally sourced from the board description.

use crate::modes::{modes, LaneCount};
use crate::timing::link_frequency;

/// 7-bit i2c address of the sensor
pub const DEFAULT_I2C_ADDRESS: u8 = 0x1a;

/// The sensor only supports a 37.125 MHz input clock (INCK)
pub const INCK_FREQUENCY: u32 = 37_125_000;

/// Reasons a configuration is refused at attach time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported number of data lanes: {0}")]
    InvalidLaneCount(u8),

    #[error("input clock frequency {0} Hz is not supported")]
    UnsupportedClock(u32),

    #[error("no link frequencies declared")]
    NoLinkFrequencies,

    /// A frequency some mode can select is missing from the declared set
    #[error("link frequency {0} Hz is not supported")]
    MissingLinkFrequency(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct Config<'a> {
    pub address: u8,
    pub lanes: u8,
    pub clock_frequency: u32,
    /// Bus link frequencies the board supports
    pub link_frequencies: &'a [u64],
}

impl<'a> Config<'a> {
    pub fn new(lanes: u8, link_frequencies: &'a [u64]) -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            lanes,
            clock_frequency: INCK_FREQUENCY,
            link_frequencies,
        }
    }

    pub fn validate(&self) -> Result<LaneCount, ConfigError> {
        let lanes = LaneCount::try_from(self.lanes)
            .map_err(ConfigError::InvalidLaneCount)?;

        if self.link_frequencies.is_empty() {
            return Err(ConfigError::NoLinkFrequencies);
        }
        for mode in modes(lanes) {
            let freq = link_frequency(lanes, mode.link_freq_index);
            if !self.link_frequencies.contains(&freq) {
                return Err(ConfigError::MissingLinkFrequency(freq));
            }
        }

        if self.clock_frequency != INCK_FREQUENCY {
            return Err(ConfigError::UnsupportedClock(self.clock_frequency));
        }

        Ok(lanes)
    }
}
