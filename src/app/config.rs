use std::time::Instant;

use log::{error, info};
use strum::IntoEnumIterator;

use super::{AppMode, Context, ModeAction, ModeKind};
use crate::config::{Config, Connection, DISPLAY_TIMEOUT_CHOICES};
use crate::input::Key;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    DisplayTimeout,
    Connection,
}

const FIELDS: [Field; 2] = [Field::DisplayTimeout, Field::Connection];


fn timeout_label(seconds: u32) -> String {
    match seconds {
        0 => "never".to_owned(),
        s if s < 60 => format!("{s}s"),
        s => format!("{}min", s / 60),
    }
}

/// Step through `choices` from `current`, wrapping at either end. An unknown
/// `current` starts from the first choice.
fn cycle<T: Copy + PartialEq>(choices: &[T], current: T, delta: i32) -> T {
    let index = choices.iter().position(|&c| c == current).unwrap_or(0) as i32;
    let len = choices.len() as i32;
    choices[(index + delta).rem_euclid(len) as usize]
}


/// Settings menu.
///
/// Turning the encoder moves the selection; turning it with the encoder button
/// held changes the selected value. MODE saves and leaves, COVER discards and
/// leaves. Saved settings apply from the next start.
#[derive(Debug, Default)]
pub struct ConfigMode {
    draft: Config,
    selected: usize,
}

impl ConfigMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn change(&mut self, delta: i32) {
        match FIELDS[self.selected] {
            Field::DisplayTimeout => {
                let seconds = self.draft.display_timeout_seconds;
                self.draft.display_timeout_seconds = cycle(&DISPLAY_TIMEOUT_CHOICES, seconds, delta);
            },
            Field::Connection => {
                let connections: Vec<Connection> = Connection::iter().collect();
                self.draft.connection = cycle(&connections, self.draft.connection, delta);
            },
        }
    }

    fn lines(&self) -> Vec<String> {
        FIELDS.iter()
            .enumerate()
            .map(|(i, field)| {
                let cursor = if i == self.selected { ">" } else { " " };
                match field {
                    Field::DisplayTimeout => format!("{cursor} Timeout: {}", timeout_label(self.draft.display_timeout_seconds)),
                    Field::Connection => format!("{cursor} Connection: {}", self.draft.connection),
                }
            })
            .collect()
    }

    fn save(&self, ctx: &Context) {
        match self.draft.save(&ctx.config_path) {
            Ok(()) => info!("saved {}, restart to apply", ctx.config_path.display()),
            Err(err) => error!("failed to save config: {err}"),
        }
    }
}

impl AppMode for ConfigMode {
    fn enter(&mut self, ctx: &mut Context, now: Instant) {
        info!("config mode");

        ctx.touch(now);
        self.draft = ctx.config.clone();
        self.selected = 0;

        ctx.display.set_power_save(false);
        ctx.display.clear();
        ctx.display.show_menu(&self.lines());
    }

    fn tick(&mut self, ctx: &mut Context, now: Instant) -> ModeAction {
        let delta = ctx.encoder.take_delta();
        if delta != 0 {
            ctx.touch(now);

            if ctx.input.is_down(Key::Encoder) {
                self.change(delta);
                // the encoder button was used as a modifier, not pressed
                ctx.input.cancel_current_chord();
            } else {
                self.selected = (self.selected as i32 + delta).rem_euclid(FIELDS.len() as i32) as usize;
            }

            ctx.display.show_menu(&self.lines());
        }

        while let Some(event) = ctx.input.pop_event() {
            ctx.touch(now);

            if event.is_single(Key::Mode) {
                self.save(ctx);
                return ModeAction::Switch(ModeKind::Standard);
            }

            if event.is_single(Key::Cover) {
                info!("config changes discarded");
                return ModeAction::Switch(ModeKind::Standard);
            }
        }

        ModeAction::Stay
    }
}
