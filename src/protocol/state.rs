use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::patterns::*;


const MASK_FAN_ON: u8 = 1 << 0;
const MASK_SPECIAL: u8 = 1 << 1;
const MASK_OUT: u8 = 1 << 2;
const MASK_COVER_OPEN: u8 = 1 << 3;
const MASK_AUTO: u8 = 1 << 4;

/// Only the low 7 bits of the control byte are transmitted.
const CONTROL_MASK: u8 = 0x7F;

const DEFAULT_SPEED: u8 = 20;
const DEFAULT_CELSIUS: i32 = 26;


#[derive(EnumString, Display, AsRefStr, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Off,
    Auto,
    Manual
}

#[derive(EnumString, Display, AsRefStr, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CoverState {
    Open,
    Closed
}

#[derive(EnumString, Display, AsRefStr, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Airflow {
    In,
    Out
}


/// Canonical fan state: control flags, speed and temperature.
///
/// Equality is byte equality of the three fields. The transmitter and the
/// transports use it to tell whether anything changed since the last send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FanState {
    /// Flag bits, see the `MASK_*` constants
    control: u8,

    /// Percentage, always one of 10, 20, ..., 100
    speed: u8,

    /// Degrees Fahrenheit, always within `MIN_FAHRENHEIT..=MAX_FAHRENHEIT`
    fahrenheit: u8,
}

impl Default for FanState {
    fn default() -> Self {
        Self {
            control: 0x00,
            speed: DEFAULT_SPEED,
            fahrenheit: celsius_to_fahrenheit(DEFAULT_CELSIUS),
        }
    }
}

impl FanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite all fields from protocol bytes.
    ///
    /// `speed` is looked up as a speed pattern first and otherwise taken as a
    /// percentage. `temperature` is looked up as a temperature pattern first
    /// and otherwise taken as degrees Fahrenheit. Both are clamped.
    pub fn set_bytes(&mut self, control: u8, speed: u8, temperature: u8) {
        self.control = control & CONTROL_MASK;

        self.speed = match speed_from_pattern(speed) {
            Some(percent) => percent,
            None => clamp_speed(speed as i32),
        };

        self.fahrenheit = match temperature_from_pattern(temperature) {
            Some(celsius) => celsius_to_fahrenheit(celsius),
            None => temperature.clamp(MIN_FAHRENHEIT, MAX_FAHRENHEIT),
        };
    }

    pub fn mode(&self) -> Mode {
        if self.control & MASK_AUTO != 0 {
            Mode::Auto
        } else if self.control & MASK_FAN_ON == 0 {
            Mode::Off
        } else {
            Mode::Manual
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        match mode {
            Mode::Off => {
                self.control &= !(MASK_FAN_ON | MASK_SPECIAL | MASK_AUTO | MASK_COVER_OPEN);
            },
            Mode::Auto => {
                self.control |= MASK_FAN_ON | MASK_SPECIAL | MASK_AUTO;
            },
            Mode::Manual => {
                self.control |= MASK_FAN_ON | MASK_COVER_OPEN;
                self.control &= !(MASK_SPECIAL | MASK_AUTO);
            }
        }
    }

    /// Speed in percent.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Rounds down to a multiple of 10 and clamps to 10..=100.
    pub fn set_speed(&mut self, percent: i32) {
        self.speed = clamp_speed(percent);
    }

    pub fn temperature_celsius(&self) -> i32 {
        fahrenheit_to_celsius(self.fahrenheit)
    }

    pub fn set_temperature_celsius(&mut self, celsius: i32) {
        self.fahrenheit = celsius_to_fahrenheit(celsius);
    }

    pub fn temperature_fahrenheit(&self) -> u8 {
        self.fahrenheit
    }

    pub fn cover(&self) -> CoverState {
        if self.control & MASK_COVER_OPEN != 0 {
            CoverState::Open
        } else {
            CoverState::Closed
        }
    }

    pub fn set_cover(&mut self, cover: CoverState) {
        match cover {
            CoverState::Open => self.control |= MASK_COVER_OPEN,
            CoverState::Closed => self.control &= !MASK_COVER_OPEN,
        }
    }

    pub fn airflow(&self) -> Airflow {
        if self.control & MASK_OUT != 0 {
            Airflow::Out
        } else {
            Airflow::In
        }
    }

    pub fn set_airflow(&mut self, airflow: Airflow) {
        match airflow {
            Airflow::Out => self.control |= MASK_OUT,
            Airflow::In => self.control &= !MASK_OUT,
        }
    }

    /// Byte `[10]` of a frame.
    pub fn control_byte(&self) -> u8 {
        self.control
    }

    /// Byte `[11]` of a frame.
    pub fn speed_pattern(&self) -> u8 {
        // speed is kept at a multiple of 10 within range
        speed_pattern(self.speed).unwrap_or(SPEED_PATTERNS[0])
    }

    /// Byte `[12]` of a frame.
    pub fn temperature_pattern(&self) -> u8 {
        let celsius = self.temperature_celsius().clamp(MIN_CELSIUS, MAX_CELSIUS);
        temperature_pattern(celsius).unwrap_or(TEMPERATURE_PATTERNS[0])
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}% {}C cover {} airflow {} (control {:02x})",
            self.mode(),
            self.speed,
            self.temperature_celsius(),
            self.cover(),
            self.airflow(),
            self.control
        )
    }
}


fn clamp_speed(percent: i32) -> u8 {
    let rounded = percent.div_euclid(10) * 10;
    rounded.clamp(MIN_SPEED as i32, MAX_SPEED as i32) as u8
}

/// Truncates toward zero, then clamps to the Fahrenheit range the fan accepts.
pub fn celsius_to_fahrenheit(celsius: i32) -> u8 {
    let fahrenheit = celsius.saturating_mul(9) / 5 + 32;
    fahrenheit.clamp(MIN_FAHRENHEIT as i32, MAX_FAHRENHEIT as i32) as u8
}

/// Rounds to the nearest degree so that every Celsius value in range
/// survives a trip through [`celsius_to_fahrenheit`].
pub fn fahrenheit_to_celsius(fahrenheit: u8) -> i32 {
    let n = (fahrenheit as i32 - 32) * 5;
    if n >= 0 {
        (n + 4) / 9
    } else {
        (n - 4) / 9
    }
}
