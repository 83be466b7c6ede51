//! Remote-control transports.
//!
//! A transport receives command messages (partial status JSON) and mirrors
//! the fan state back out. Command callbacks are only ever invoked from
//! [`FanController::poll`], which runs on the main loop, so nothing else needs
//! to synchronise with them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Result;

use crate::protocol::state::FanState;

pub mod ble;
pub mod mqtt;
pub mod nil;
pub mod timer;

pub use ble::BleController;
pub use mqtt::MqttController;
pub use nil::NilController;
pub use timer::TimerController;


pub type CommandCallback = Box<dyn FnMut(&str)>;


/// Icon shown next to the connection indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    None,
    Timer,
    Broker,
    Ble,
}


pub trait FanController {
    /// Bring the transport up. Failing here leaves the transport disconnected.
    fn begin(&mut self) -> Result<()>;

    fn set_command_callback(&mut self, callback: CommandCallback);

    /// The state to mirror. Transports only send it out when it changed.
    fn notify_status(&mut self, state: &FanState);

    /// Advance the transport; invokes the command callback for every command
    /// received since the last call.
    fn poll(&mut self, now: Instant);

    fn is_connected(&self) -> bool;

    fn icon(&self) -> Icon;

    /// Single letter status hint, if any.
    fn indicator_letter(&self) -> Option<char>;
}


/// Queue of received commands, filled by a [`CommandCallback`] and drained
/// by the orchestrator after polling.
#[derive(Clone, Default)]
pub struct CommandInbox(Rc<RefCell<VecDeque<String>>>);

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> CommandCallback {
        let inbox = self.0.clone();
        Box::new(move |command| inbox.borrow_mut().push_back(command.to_owned()))
    }

    pub fn pop(&self) -> Option<String> {
        self.0.borrow_mut().pop_front()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox() {
        let inbox = CommandInbox::new();
        let mut callback = inbox.callback();

        callback("{\"mode\":\"OFF\"}");
        callback("{}");

        assert_eq!(inbox.pop().as_deref(), Some("{\"mode\":\"OFF\"}"));
        assert_eq!(inbox.pop().as_deref(), Some("{}"));
        assert_eq!(inbox.pop(), None);
    }
}
