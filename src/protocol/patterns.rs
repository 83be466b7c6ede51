//! Fixed constants of the fan's infrared protocol.
//!
//! The speed and temperature patterns are 7 bit codes with no arithmetic
//! relation to the value they stand for, so they are plain lookup tables.

use std::time::Duration;

/// Bytes `[0..10]` of every frame.
pub const HEADER: [u8; 10] = [0x5A, 0xA5, 0x80, 0x7F, 0x40, 0xBF, 0x20, 0xDF, 0x10, 0xCC];

/// Bytes `[13..15]` of every frame.
pub const TRAILER: [u8; 2] = [0xFF, 0x23];

/// Byte `[16]`, sent after the checksum.
pub const FILLER: u8 = 0xFF;

/// Duration of a single bit on the wire, in microseconds.
pub const TICK_US: u16 = 400;

/// IR carrier frequency.
pub const CARRIER_KHZ: u8 = 38;

/// Receiver durations shorter than this are glitches, not bits.
pub const NOISE_THRESHOLD_US: u16 = 100;

/// The fan unit ignores commands for a while after power-up.
pub const WARMUP: Duration = Duration::from_millis(5000);

/// Minimum time between two transmissions.
pub const THROTTLE: Duration = Duration::from_millis(2000);

pub const MIN_SPEED: u8 = 10;
pub const MAX_SPEED: u8 = 100;

pub const MIN_CELSIUS: i32 = -2;
pub const MAX_CELSIUS: i32 = 37;

pub const MIN_FAHRENHEIT: u8 = 29;
pub const MAX_FAHRENHEIT: u8 = 99;

/// Speed patterns for 10%, 20%, ..., 100%.
pub const SPEED_PATTERNS: [u8; 10] = [
    0b1010111, // 10
    0b1101011, // 20
    0b1000011, // 30
    0b1110101, // 40
    0b1011001, // 50
    0b1100001, // 60
    0b1001110, // 70
    0b1111010, // 80
    0b1010010, // 90
    0b1101100, // 100
];

/// Temperature patterns for -2°C through 37°C, one per degree.
pub const TEMPERATURE_PATTERNS: [u8; 40] = [
    0b0100011, // -2
    0b0000011, // -1
    0b1111101, //  0
    0b0111101,
    0b0011101,
    0b0101101,
    0b0001101,
    0b0110101, //  5
    0b1010101,
    0b1100101,
    0b1000101,
    0b1111001,
    0b1011001, // 10
    0b0011001,
    0b0101001,
    0b0001001,
    0b0110001,
    0b0010001, // 15
    0b1100001,
    0b1000001,
    0b1111110,
    0b1011110,
    0b1101110, // 20
    0b0101110,
    0b0001110,
    0b0110110,
    0b0010110,
    0b0100110, // 25
    0b1000110,
    0b1111010,
    0b1011010,
    0b1101010,
    0b1001010, // 30
    0b0001010,
    0b0110010,
    0b0010010,
    0b0100010,
    0b0000010, // 35
    0b1111100,
    0b1011100, // 37
];

/// Pattern for a speed percentage. `None` unless `percent` is one of 10, 20, ..., 100.
pub fn speed_pattern(percent: u8) -> Option<u8> {
    if percent % 10 != 0 || !(MIN_SPEED..=MAX_SPEED).contains(&percent) {
        return None;
    }

    Some(SPEED_PATTERNS[(percent / 10 - 1) as usize])
}

/// Percentage for a speed pattern.
pub fn speed_from_pattern(pattern: u8) -> Option<u8> {
    SPEED_PATTERNS
        .iter()
        .position(|&p| p == pattern)
        .map(|idx| (idx as u8 + 1) * 10)
}

/// Pattern for a temperature in degrees Celsius.
pub fn temperature_pattern(celsius: i32) -> Option<u8> {
    if !(MIN_CELSIUS..=MAX_CELSIUS).contains(&celsius) {
        return None;
    }

    Some(TEMPERATURE_PATTERNS[(celsius - MIN_CELSIUS) as usize])
}

/// Degrees Celsius for a temperature pattern.
pub fn temperature_from_pattern(pattern: u8) -> Option<i32> {
    TEMPERATURE_PATTERNS
        .iter()
        .position(|&p| p == pattern)
        .map(|idx| idx as i32 + MIN_CELSIUS)
}
