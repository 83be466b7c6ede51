use std::collections::VecDeque;

use log::{debug, trace};

use super::frame::{CaptureError, RawFrame};
use super::pulses::{self, PulseTrain};
use super::state::FanState;


/// Something that hands out completed IR captures without blocking.
pub trait CaptureSource {
    fn try_capture(&mut self) -> Option<PulseTrain>;
}

impl CaptureSource for VecDeque<PulseTrain> {
    fn try_capture(&mut self) -> Option<PulseTrain> {
        self.pop_front()
    }
}


/// Decode one capture into a validated frame.
pub fn decode_frame(durations: &[u16]) -> Result<RawFrame, CaptureError> {
    let bytes = pulses::decode_capture(durations)?;
    RawFrame::validate(&bytes)
}


/// Receive path: turns captures from a [`CaptureSource`] into state updates.
#[derive(Debug, Default)]
pub struct IrReceiver {
    accepted: u64,
    rejected: u64,
}

impl IrReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every queued capture and apply the valid ones to `state`.
    ///
    /// Each capture is handled on its own; a rejected capture never stops the
    /// ones behind it. Returns `true` if at least one capture was applied.
    pub fn update<S>(&mut self, state: &mut FanState, source: &mut S) -> bool
    where
        S: CaptureSource + ?Sized
    {
        let mut updated = false;

        while let Some(capture) = source.try_capture() {
            match decode_frame(&capture.durations) {
                Ok(frame) => {
                    frame.apply(state);
                    self.accepted += 1;
                    updated = true;

                    debug!("received {state}");
                },
                Err(err) => {
                    self.rejected += 1;
                    trace!("capture of {} durations dropped: {err}", capture.durations.len());
                }
            }
        }

        updated
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
