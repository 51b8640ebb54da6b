/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Static catalog of capture modes and pixel formats.
//!
//! Each lane count has its own mode table; a table is chosen once at
//! attach time and entries are only ever selected, never modified.

use crate::registers::RegisterSetting;
use crate::timing::LINK_FREQ_INDEX_1080P;

// Array format: 1952 H x 1113 V native, 1920 H x 1080 V active
pub const NATIVE_WIDTH: u32 = 1952;
pub const NATIVE_HEIGHT: u32 = 1113;
pub const PIXEL_ARRAY_LEFT: u32 = 16;
pub const PIXEL_ARRAY_TOP: u32 = 8;
pub const PIXEL_ARRAY_WIDTH: u32 = 1920;
pub const PIXEL_ARRAY_HEIGHT: u32 = 1080;

/// Number of MIPI CSI-2 data lanes wired to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneCount {
    Two = 2,
    Four = 4,
}

impl LaneCount {
    pub const fn count(self) -> u8 {
        self as u8
    }

    /// Value shared by the PHY lane number and CSI lane mode registers
    pub(crate) const fn lane_register_value(self) -> u8 {
        match self {
            LaneCount::Two => 0x01,
            LaneCount::Four => 0x03,
        }
    }
}

impl TryFrom<u8> for LaneCount {
    type Error = u8;

    fn try_from(lanes: u8) -> Result<Self, u8> {
        match lanes {
            2 => Ok(LaneCount::Two),
            4 => Ok(LaneCount::Four),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    pub hmax: u32,
    pub vmax: u32,
    pub link_freq_index: usize,
    pub crop: Rect,
    pub registers: &'static [RegisterSetting],
}

/// Bayer pixel formats the sensor can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Srggb10,
    Srggb12,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 2] = [PixelFormat::Srggb10, PixelFormat::Srggb12];

    pub const fn bits_per_pixel(self) -> u8 {
        match self {
            PixelFormat::Srggb10 => 10,
            PixelFormat::Srggb12 => 12,
        }
    }

    /// Media bus code (MEDIA_BUS_FMT_SRGGBxx_1Xxx)
    pub const fn bus_code(self) -> u32 {
        match self {
            PixelFormat::Srggb10 => 0x300f,
            PixelFormat::Srggb12 => 0x3012,
        }
    }

    /// Unknown codes resolve to the first supported format
    pub fn from_bus_code(code: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.bus_code() == code)
            .unwrap_or(Self::ALL[0])
    }

    pub fn registers(self) -> &'static [RegisterSetting] {
        match self {
            PixelFormat::Srggb10 => &SETTINGS_10BIT,
            PixelFormat::Srggb12 => &SETTINGS_12BIT,
        }
    }
}

/// Black level restored when the pattern generator is switched off
pub const fn black_level(bits_per_pixel: u8) -> u8 {
    if bits_per_pixel == 10 {
        0x3c
    } else {
        0xf0
    }
}

const fn reg(address: u16, value: u8) -> RegisterSetting {
    RegisterSetting::new(address, value)
}

static SETTINGS_10BIT: [RegisterSetting; 19] = [
    reg(0x3005, 0x00),
    reg(0x337d, 0x0a),
    reg(0x337e, 0x0a),
    // INCK
    reg(0x305c, 0x28),
    reg(0x305d, 0x00),
    reg(0x305e, 0x20),
    reg(0x305f, 0x00),
    // black level
    reg(0x300a, 0x3c),
    reg(0x300b, 0x00),
    // global timings
    reg(0x3382, 0x5f),
    reg(0x3383, 0x1f),
    reg(0x3384, 0x37),
    reg(0x3385, 0x1f),
    reg(0x3386, 0x17),
    reg(0x3387, 0x17),
    reg(0x3388, 0x67),
    reg(0x3389, 0x27),
    reg(0x336b, 0x37),
    reg(0x3344, 0x20),
];

static SETTINGS_12BIT: [RegisterSetting; 19] = [
    reg(0x3005, 0x01),
    reg(0x337d, 0x0c),
    reg(0x337e, 0x0c),
    // INCK
    reg(0x305c, 0x18),
    reg(0x305d, 0x00),
    reg(0x305e, 0x20),
    reg(0x305f, 0x00),
    // black level
    reg(0x300a, 0xf0),
    reg(0x300b, 0x00),
    // global timings
    reg(0x3382, 0x67),
    reg(0x3383, 0x1f),
    reg(0x3384, 0x3f),
    reg(0x3385, 0x27),
    reg(0x3386, 0x1f),
    reg(0x3387, 0x17),
    reg(0x3388, 0x77),
    reg(0x3389, 0x27),
    reg(0x336b, 0x3f),
    reg(0x3344, 0x20),
];

static SETTINGS_1080P30: [RegisterSetting; 42] = [
    reg(0x3007, 0x00),
    reg(0x3009, 0x02),
    reg(0x3012, 0x2c),
    reg(0x3013, 0x01),
    reg(0x3014, 0x07),
    // VMAX, 30 fps
    reg(0x3018, 0x46),
    reg(0x3019, 0x05),
    reg(0x301b, 0x30),
    reg(0x301c, 0x11),
    // SHS1
    reg(0x3020, 0x02),
    reg(0x3021, 0x00),
    reg(0x3044, 0x01),
    reg(0x3046, 0x30),
    reg(0x3047, 0x38),
    reg(0x3049, 0x0a),
    reg(0x3054, 0x66),
    reg(0x310b, 0x07),
    reg(0x3110, 0x12),
    reg(0x31ed, 0x38),
    reg(0x3338, 0xd4),
    reg(0x3339, 0x40),
    reg(0x333a, 0x10),
    reg(0x333b, 0x00),
    reg(0x333c, 0xd4),
    reg(0x333d, 0x40),
    reg(0x333e, 0x10),
    reg(0x333f, 0x00),
    reg(0x336c, 0x1f),
    // INCK FREQ1
    reg(0x3380, 0x20),
    reg(0x3381, 0x25),
    // INCK FREQ2
    reg(0x338d, 0xb4),
    reg(0x338e, 0x01),
    // WINPH
    reg(0x303c, 0x0c),
    reg(0x303d, 0x00),
    // WINWH
    reg(0x303e, 0x80),
    reg(0x303f, 0x07),
    // WINPV
    reg(0x3038, 0x08),
    reg(0x3039, 0x00),
    // WINWV
    reg(0x303a, 0x38),
    reg(0x303b, 0x04),
    // PIC_SIZE_V
    reg(0x3057, 0x38),
    reg(0x3058, 0x04),
];

const CROP_1080P: Rect = Rect {
    left: 16,
    top: 9,
    width: 1920,
    height: 1080,
};

pub static MODES_2LANES: [Mode; 1] = [Mode {
    width: 1920,
    height: 1080,
    hmax: 0x1130,
    vmax: 0x0465,
    link_freq_index: LINK_FREQ_INDEX_1080P,
    crop: CROP_1080P,
    registers: &SETTINGS_1080P30,
}];

pub static MODES_4LANES: [Mode; 1] = [Mode {
    width: 1920,
    height: 1080,
    hmax: 0x1130,
    vmax: 0x0465,
    link_freq_index: LINK_FREQ_INDEX_1080P,
    crop: CROP_1080P,
    registers: &SETTINGS_1080P30,
}];

pub fn modes(lanes: LaneCount) -> &'static [Mode] {
    match lanes {
        LaneCount::Two => &MODES_2LANES,
        LaneCount::Four => &MODES_4LANES,
    }
}

/// Pick the mode closest to the requested size.
/// Falls back to the first entry; selection never fails.
pub fn find_nearest(lanes: LaneCount, width: u32, height: u32) -> &'static Mode {
    let table = modes(lanes);
    let distance =
        |mode: &Mode| mode.width.abs_diff(width) + mode.height.abs_diff(height);

    let mut best = &table[0];
    let mut best_distance = distance(best);
    for mode in &table[1..] {
        let d = distance(mode);
        if d < best_distance {
            best = mode;
            best_distance = d;
        }
    }
    best
}
