//! Drives the input atomics from text commands, for hosts without a real
//! encoder and buttons.

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use strum_macros::EnumString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::encoder::{EncoderCounter, TRANSITIONS_PER_DETENT};
use super::levels::{ButtonLevels, Key};


/// How long a console "press" holds the keys down. Longer than two samples
/// so the chord input always sees it.
const PRESS_DURATION: Duration = Duration::from_millis(60);


#[derive(EnumString, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelCommand {
    #[strum(serialize = "+")]
    Clockwise,
    #[strum(serialize = "-")]
    CounterClockwise,
    #[strum(serialize = "enc")]
    Encoder,
    #[strum(serialize = "mode")]
    Mode,
    #[strum(serialize = "cover")]
    Cover,
    #[strum(serialize = "mode+cover", serialize = "cover+mode")]
    ModeCover,
    #[strum(serialize = "enc+cover", serialize = "cover+enc")]
    EncoderCover,
}

impl PanelCommand {
    fn keys(self) -> &'static [Key] {
        match self {
            PanelCommand::Clockwise | PanelCommand::CounterClockwise => &[],
            PanelCommand::Encoder => &[Key::Encoder],
            PanelCommand::Mode => &[Key::Mode],
            PanelCommand::Cover => &[Key::Cover],
            PanelCommand::ModeCover => &[Key::Mode, Key::Cover],
            PanelCommand::EncoderCover => &[Key::Encoder, Key::Cover],
        }
    }
}


#[derive(Clone)]
pub struct Panel {
    encoder: Arc<EncoderCounter>,
    levels: Arc<ButtonLevels>,
}

impl Panel {
    pub fn new(encoder: Arc<EncoderCounter>, levels: Arc<ButtonLevels>) -> Self {
        Self { encoder, levels }
    }

    pub async fn apply(&self, command: PanelCommand) {
        match command {
            PanelCommand::Clockwise => self.encoder.record(TRANSITIONS_PER_DETENT),
            PanelCommand::CounterClockwise => self.encoder.record(-TRANSITIONS_PER_DETENT),
            _ => {
                for key in command.keys() {
                    self.levels.set(*key, true);
                }

                sleep(PRESS_DURATION).await;

                for key in command.keys() {
                    self.levels.set(*key, false);
                }

                // keep back-to-back presses apart
                sleep(PRESS_DURATION).await;
            }
        }
    }

    /// Read commands line by line until `reader` is exhausted.
    pub fn spawn<R>(self, reader: R) -> JoinHandle<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static
    {
        tokio::spawn(async move {
            let mut lines = reader.lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => return,
                    Err(err) => {
                        warn!("panel input failed: {err}");
                        return;
                    }
                };

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.parse::<PanelCommand>() {
                    Ok(command) => self.apply(command).await,
                    Err(_) => warn!("unknown panel command {line:?} (try +, -, enc, mode, cover, mode+cover)"),
                }
            }
        })
    }
}
