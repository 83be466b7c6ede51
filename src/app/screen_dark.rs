use std::time::Instant;

use log::info;

use super::{AppMode, Context, ModeAction, ModeKind};


/// Display off. Any input is swallowed and brings the status screen back.
#[derive(Debug, Default)]
pub struct ScreenDarkMode;

impl ScreenDarkMode {
    pub fn new() -> Self {
        Self
    }
}

impl AppMode for ScreenDarkMode {
    fn enter(&mut self, ctx: &mut Context, _now: Instant) {
        info!("screen dark");

        ctx.display.clear();
        ctx.display.set_power_save(true);
    }

    fn tick(&mut self, ctx: &mut Context, now: Instant) -> ModeAction {
        let turned = ctx.encoder.take_delta() != 0;

        let mut pressed = false;
        while ctx.input.pop_event().is_some() {
            pressed = true;
        }

        if turned || pressed {
            ctx.touch(now);
            ctx.display.set_power_save(false);
            return ModeAction::Switch(ModeKind::Standard);
        }

        ModeAction::Stay
    }
}
