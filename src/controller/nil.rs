use std::time::Instant;

use anyhow::Result;

use super::{CommandCallback, FanController, Icon};
use crate::protocol::state::FanState;


/// No transport configured.
#[derive(Debug, Default)]
pub struct NilController;

impl FanController for NilController {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_command_callback(&mut self, _callback: CommandCallback) {}

    fn notify_status(&mut self, _state: &FanState) {}

    fn poll(&mut self, _now: Instant) {}

    fn is_connected(&self) -> bool {
        false
    }

    fn icon(&self) -> Icon {
        Icon::None
    }

    fn indicator_letter(&self) -> Option<char> {
        None
    }
}
