//! Conversion between bytes and IR pulse durations.
//!
//! Each byte goes on the wire as 11 bits of `TICK_US` each: a start bit
//! (`false`), 8 data bits LSB first, and two stop bits (`true`). Runs of
//! equal bits merge into a single duration, and the first duration of a
//! train is always a `false` run.

use super::frame::{CaptureError, FRAME_SIZE};
use super::patterns::{NOISE_THRESHOLD_US, TICK_US};


const BITS_PER_BYTE: usize = 11;

/// Partially received checksum bytes with at least this many bits
/// (start bit included) are completed with `1`s.
const MIN_TAIL_BITS: usize = 7;
const MAX_TAIL_BITS: usize = 8;


/// A train of alternating-level durations in microseconds, plus the
/// carrier to modulate it with (zero for captures).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PulseTrain {
    pub carrier_khz: u8,
    pub durations: Vec<u16>,
}

impl PulseTrain {
    pub fn new(carrier_khz: u8, durations: Vec<u16>) -> Self {
        Self { carrier_khz, durations }
    }

    pub fn capture(durations: Vec<u16>) -> Self {
        Self { carrier_khz: 0, durations }
    }
}


fn framed_bits(byte: u8) -> impl Iterator<Item = bool> {
    (0..BITS_PER_BYTE).map(move |idx| match idx {
        0 => false,
        1..=8 => (byte >> (idx - 1)) & 0x01 != 0,
        _ => true,
    })
}

/// Encode `bytes` as durations of `tick_us` per bit.
///
/// A run longer than `u16::MAX` microseconds saturates.
pub fn encode(bytes: &[u8], tick_us: u16) -> Vec<u16> {
    let mut durations = Vec::new();

    let mut level = false;
    let mut ticks: u16 = 0;

    for bit in bytes.iter().flat_map(|&b| framed_bits(b)) {
        if bit == level {
            ticks += 1;
        } else {
            durations.push(ticks.saturating_mul(tick_us));
            level = bit;
            ticks = 1;
        }
    }

    if ticks > 0 {
        durations.push(ticks.saturating_mul(tick_us));
    }

    durations
}


/// Collects bits into 11 bit groups and turns them into bytes.
struct ByteAccumulator {
    bytes: Vec<u8>,
    bits: Vec<bool>,
}

impl ByteAccumulator {
    fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(FRAME_SIZE),
            bits: Vec::with_capacity(BITS_PER_BYTE),
        }
    }

    fn is_full(&self) -> bool {
        self.bytes.len() >= FRAME_SIZE
    }

    fn push(&mut self, bit: bool) -> Result<(), CaptureError> {
        if self.is_full() {
            return Ok(());
        }

        self.bits.push(bit);

        if self.bits.len() == BITS_PER_BYTE {
            let byte = self.bytes.len();

            if self.bits[0] {
                return Err(CaptureError::StartBit { byte });
            }
            if !(self.bits[9] && self.bits[10]) {
                return Err(CaptureError::StopBit { byte });
            }

            self.bytes.push(data_byte(&self.bits[1..9]));
            self.bits.clear();
        }

        Ok(())
    }

    /// The capture window often ends before the tail of the checksum byte,
    /// whose missing high bits are then ones.
    fn finish(mut self) -> Result<[u8; FRAME_SIZE], CaptureError> {
        if self.bytes.len() == FRAME_SIZE - 1 && (MIN_TAIL_BITS..=MAX_TAIL_BITS).contains(&self.bits.len()) {
            if self.bits[0] {
                return Err(CaptureError::StartBit { byte: self.bytes.len() });
            }

            self.bits.resize(9, true);
            self.bytes.push(data_byte(&self.bits[1..9]));
        }

        let bytes = self.bytes.len();
        let bits = self.bits.len();

        self.bytes
            .try_into()
            .map_err(|_| CaptureError::TooShort { bytes, bits })
    }
}

fn data_byte(bits: &[bool]) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0, |acc, (idx, &bit)| acc | ((bit as u8) << idx))
}


/// Recover the first 16 bytes from captured durations of `tick_us` per bit.
///
/// Durations under the noise threshold are dropped without flipping the
/// level. Anything after the 16th byte is ignored.
pub fn decode(durations: &[u16], tick_us: u16) -> Result<[u8; FRAME_SIZE], CaptureError> {
    let mut acc = ByteAccumulator::new();
    let mut level = false;

    for &duration in durations.iter().filter(|&&d| d >= NOISE_THRESHOLD_US) {
        let count = ((duration as f32 / tick_us as f32).round() as usize).max(1);

        for _ in 0..count {
            if acc.is_full() {
                break;
            }
            acc.push(level)?;
        }

        if acc.is_full() {
            break;
        }

        level = !level;
    }

    acc.finish()
}

/// [`decode`] with the protocol's tick.
pub fn decode_capture(durations: &[u16]) -> Result<[u8; FRAME_SIZE], CaptureError> {
    decode(durations, TICK_US)
}
