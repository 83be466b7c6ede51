//! Bridges a framed port to the cooperative main loop.
//!
//! The port is owned by a task; the loop only ever touches the two
//! unbounded queues, so neither side blocks the other.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::{select, sync::mpsc, task::JoinHandle};

use crate::port::PortStream;
use crate::protocol::codec::BridgeFrame;
use crate::protocol::pulses::PulseTrain;
use crate::protocol::receiver::CaptureSource;
use crate::protocol::remote::IrTransmitter;


/// Both directions of an IR peripheral.
pub trait IrPort: CaptureSource + IrTransmitter {}

impl<T> IrPort for T where T: CaptureSource + IrTransmitter {}


pub struct IrLink {
    captures: mpsc::UnboundedReceiver<PulseTrain>,
    transmissions: mpsc::UnboundedSender<PulseTrain>,
}

impl IrLink {
    /// Spawn the port task. The task ends when the port closes or fails, or
    /// when the link is dropped.
    pub fn spawn(port: Box<dyn PortStream>) -> (Self, JoinHandle<Result<()>>) {
        let (captures_tx, captures) = mpsc::unbounded_channel();
        let (transmissions, transmissions_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(port_task(port, captures_tx, transmissions_rx));

        (Self { captures, transmissions }, handle)
    }
}

impl CaptureSource for IrLink {
    fn try_capture(&mut self) -> Option<PulseTrain> {
        self.captures.try_recv().ok()
    }
}

impl IrTransmitter for IrLink {
    fn transmit(&mut self, train: PulseTrain) {
        if self.transmissions.send(train).is_err() {
            warn!("IR port closed, dropping transmission");
        }
    }
}


async fn port_task(
    mut port: Box<dyn PortStream>,
    captures: mpsc::UnboundedSender<PulseTrain>,
    mut transmissions: mpsc::UnboundedReceiver<PulseTrain>
) -> Result<()> {
    loop {
        select! {
            frame = port.next() => {
                match frame {
                    Some(Ok(BridgeFrame::Pulses(train))) => {
                        if captures.send(train).is_err() {
                            return Ok(());
                        }
                    },
                    Some(Ok(BridgeFrame::Corrupted(data))) => {
                        debug!("corrupted bridge frame: {data:02x?}");
                    },
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                }
            },

            train = transmissions.recv() => {
                match train {
                    Some(train) => port.send(train).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}
