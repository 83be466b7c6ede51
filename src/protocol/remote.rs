use std::time::Instant;

use log::{debug, error};

use super::frame::RawFrame;
use super::patterns::{CARRIER_KHZ, THROTTLE, TICK_US, WARMUP};
use super::pulses::{self, PulseTrain};
use super::state::FanState;


/// Fire-and-forget IR output.
pub trait IrTransmitter {
    fn transmit(&mut self, train: PulseTrain);
}

impl IrTransmitter for Vec<PulseTrain> {
    fn transmit(&mut self, train: PulseTrain) {
        self.push(train);
    }
}


/// Build the pulse train that commands the fan into `state`.
pub fn pulse_train(state: &FanState) -> Result<PulseTrain, packed_struct::PackingError> {
    let wire = RawFrame::new(state).to_wire()?;
    Ok(PulseTrain::new(CARRIER_KHZ, pulses::encode(&wire, TICK_US)))
}


/// Transmit path: re-asserts the state over IR when it changed, after the
/// warm-up window and no more often than the throttle allows.
#[derive(Debug)]
pub struct IrRemote {
    boot: Instant,
    last_sent_at: Option<Instant>,
    last_sent: Option<FanState>,
}

impl IrRemote {
    pub fn new(boot: Instant) -> Self {
        Self {
            boot,
            last_sent_at: None,
            last_sent: None,
        }
    }

    /// Returns `true` if `state` was handed to `tx`.
    pub fn send<T>(&mut self, state: &FanState, now: Instant, tx: &mut T) -> bool
    where
        T: IrTransmitter + ?Sized
    {
        if now.saturating_duration_since(self.boot) < WARMUP {
            return false;
        }

        if let Some(at) = self.last_sent_at {
            if now.saturating_duration_since(at) < THROTTLE {
                return false;
            }
        }

        if self.last_sent.as_ref() == Some(state) {
            return false;
        }

        let train = match pulse_train(state) {
            Ok(train) => train,
            Err(err) => {
                error!("failed to build frame for {state}: {err}");
                return false;
            }
        };

        debug!("sending {state} ({} durations)", train.durations.len());
        tx.transmit(train);

        self.last_sent = Some(*state);
        self.last_sent_at = Some(now);

        true
    }

    pub fn last_sent(&self) -> Option<&FanState> {
        self.last_sent.as_ref()
    }
}
