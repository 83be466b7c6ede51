use packed_struct::prelude::*;
use thiserror::Error;

use super::patterns::{FILLER, HEADER, TRAILER};
use super::state::FanState;


/// Number of bytes in a frame that carry information.
pub const FRAME_SIZE: usize = 16;

/// Number of bytes sent on the wire (frame plus filler).
pub const WIRE_SIZE: usize = FRAME_SIZE + 1;


pub trait Checksum {
    fn checksum(&mut self) -> u8;
}

impl<'a> Checksum for std::slice::Iter<'a, u8> {
    fn checksum(&mut self) -> u8 {
        self.fold(0, |acc, byte| acc ^ byte)
    }
}


/// Why a capture was dropped.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture too short ({bytes} bytes and {bits} bits)")]
    TooShort {
        bytes: usize,
        bits: usize
    },
    #[error("missing start bit in byte {byte}")]
    StartBit {
        byte: usize
    },
    #[error("missing stop bits in byte {byte}")]
    StopBit {
        byte: usize
    },
    #[error("header mismatch")]
    Header,
    #[error("invalid checksum (expected {expected:x}, actual: {actual:x})")]
    Checksum {
        expected: u8,
        actual: u8
    },
    #[error("unpacking frame: {0}")]
    Packing(#[from] PackingError),
}


/// The 16 byte payload of one IR transmission.
#[derive(PackedStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[packed_struct(bit_numbering="msb0", size_bytes="16")]
pub struct RawFrame {
    #[packed_field(bytes="0..=9")]
    pub header: [u8; 10],

    /// Control flags
    #[packed_field(bytes="10")]
    pub control: u8,

    /// Speed pattern
    #[packed_field(bytes="11")]
    pub speed: u8,

    /// Temperature pattern
    #[packed_field(bytes="12")]
    pub temperature: u8,

    #[packed_field(bytes="13..=14")]
    pub trailer: [u8; 2],

    /// XOR of bytes 10 to 14
    #[packed_field(bytes="15")]
    pub checksum: u8,
}

impl RawFrame {
    pub fn new(state: &FanState) -> Self {
        let mut frame = Self {
            header: HEADER,
            control: state.control_byte(),
            speed: state.speed_pattern(),
            temperature: state.temperature_pattern(),
            trailer: TRAILER,
            checksum: 0,
        };
        frame.checksum = frame.expected_checksum();
        frame
    }

    pub fn expected_checksum(&self) -> u8 {
        [self.control, self.speed, self.temperature, self.trailer[0], self.trailer[1]]
            .iter()
            .checksum()
    }

    /// Check header and checksum of received bytes.
    pub fn validate(bytes: &[u8; FRAME_SIZE]) -> Result<Self, CaptureError> {
        if bytes[..HEADER.len()] != HEADER {
            return Err(CaptureError::Header);
        }

        let frame = Self::unpack(bytes)?;

        let expected = frame.expected_checksum();
        if expected != frame.checksum {
            return Err(CaptureError::Checksum { expected, actual: frame.checksum });
        }

        Ok(frame)
    }

    /// Bytes as sent, with the trailing filler.
    pub fn to_wire(&self) -> Result<[u8; WIRE_SIZE], PackingError> {
        let packed = self.pack()?;

        let mut wire = [FILLER; WIRE_SIZE];
        wire[..FRAME_SIZE].copy_from_slice(&packed);

        Ok(wire)
    }

    /// Overwrite `state` with the control/speed/temperature triple.
    pub fn apply(&self, state: &mut FanState) {
        state.set_bytes(self.control, self.speed, self.temperature);
    }
}
