use std::time::Instant;

use log::{debug, info};

use super::{AppMode, Context, ModeAction, ModeKind};
use crate::input::Key;
use crate::protocol::state::{Airflow, CoverState, Mode};


/// Status screen. The encoder adjusts speed (MANUAL) or temperature (AUTO);
/// the buttons toggle airflow, cover and mode.
#[derive(Debug, Default)]
pub struct StandardMode;

impl StandardMode {
    pub fn new() -> Self {
        Self
    }
}

fn next_mode(mode: Mode) -> Mode {
    match mode {
        Mode::Off => Mode::Manual,
        Mode::Manual => Mode::Auto,
        Mode::Auto => Mode::Off,
    }
}

impl AppMode for StandardMode {
    fn enter(&mut self, ctx: &mut Context, now: Instant) {
        info!("standard mode");

        ctx.touch(now);
        ctx.display.set_power_save(false);
        ctx.display.clear();
    }

    fn tick(&mut self, ctx: &mut Context, now: Instant) -> ModeAction {
        let delta = ctx.encoder.take_delta();
        if delta != 0 {
            ctx.touch(now);

            let state = &mut ctx.state;
            match state.mode() {
                Mode::Off => {},
                Mode::Manual => state.set_speed(state.speed() as i32 + 10 * delta),
                Mode::Auto => state.set_temperature_celsius(state.temperature_celsius() + delta),
            }
        }

        while let Some(event) = ctx.input.pop_event() {
            ctx.touch(now);
            debug!("key event {:?}", event.keys());

            let state = &mut ctx.state;

            if event.is_single(Key::Encoder) {
                state.set_airflow(match state.airflow() {
                    Airflow::In => Airflow::Out,
                    Airflow::Out => Airflow::In,
                });
            } else if event.is_single(Key::Cover) {
                state.set_cover(match state.cover() {
                    CoverState::Open => CoverState::Closed,
                    CoverState::Closed => CoverState::Open,
                });
            } else if event.is_single(Key::Mode) {
                state.set_mode(next_mode(state.mode()));
            } else if event.is_chord(Key::Mode, Key::Cover) {
                return ModeAction::Switch(ModeKind::Config);
            }
        }

        ctx.update_display(now);

        if ctx.is_idle(now) {
            return ModeAction::Switch(ModeKind::ScreenDark);
        }

        ModeAction::Stay
    }
}
