/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Link frequency, pixel rate and line-timing arithmetic.

use crate::modes::{LaneCount, Mode};

pub const EXPOSURE_MIN: i64 = 1;
pub const VMAX_MAX: u32 = 0x1ffff;
pub const HMAX_MIN: u32 = 2200;
pub const HMAX_MAX: u32 = 0x3fff;

pub const LINK_FREQ_INDEX_1080P: usize = 0;
pub const LINK_FREQ_INDEX_720P: usize = 1;

/// Per-lane link frequencies in Hz, indexed by resolution tier
pub const LINK_FREQ_2LANES: [u64; 2] = [371_250_000, 297_000_000];
/// Same total bandwidth as two lanes, split across four
pub const LINK_FREQ_4LANES: [u64; 2] = [185_625_000, 148_500_000];

pub fn link_frequencies(lanes: LaneCount) -> &'static [u64] {
    match lanes {
        LaneCount::Two => &LINK_FREQ_2LANES,
        LaneCount::Four => &LINK_FREQ_4LANES,
    }
}

pub fn link_frequency(lanes: LaneCount, index: usize) -> u64 {
    link_frequencies(lanes).get(index).copied().unwrap_or(0)
}

/// pixel rate = link_freq * 2 * nr_of_lanes / bits_per_sample
pub fn pixel_rate(lanes: LaneCount, link_freq_index: usize, bits_per_pixel: u8) -> u64 {
    link_frequency(lanes, link_freq_index) * 2 * u64::from(lanes.count())
        / u64::from(bits_per_pixel)
}

/// Total lines per frame for a vertical blank value
pub fn vmax(mode: &Mode, vblank: i64) -> u32 {
    to_register(vblank + i64::from(mode.height))
}

/// Total clocks per line for a horizontal blank value
pub fn hmax(mode: &Mode, hblank: i64) -> u32 {
    to_register(hblank + i64::from(mode.width))
}

/// SHS1 counts from the end of the frame, so the register holds
/// the lines *not* exposed
pub fn exposure_register(mode: &Mode, vblank: i64, exposure: i64) -> u32 {
    to_register(i64::from(mode.height) + vblank - exposure - 1)
}

pub fn exposure_max(mode: &Mode, vblank: i64) -> i64 {
    i64::from(vmax(mode, vblank)) - 2
}

pub fn hblank_range(mode: &Mode) -> (i64, i64) {
    (
        i64::from(HMAX_MIN) - i64::from(mode.width),
        i64::from(HMAX_MAX) - i64::from(mode.width),
    )
}

pub fn vblank_range(mode: &Mode) -> (i64, i64) {
    (
        i64::from(mode.vmax) - i64::from(mode.height),
        i64::from(VMAX_MAX) - i64::from(mode.height),
    )
}

fn to_register(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
