use std::time::Instant;

use anyhow::Result;
use log::{info, warn};

use super::{CommandCallback, FanController, Icon};
use crate::config::TimerConfig;
use crate::protocol::state::{CoverState, FanState, Mode};
use crate::protocol::status::StatusUpdate;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    Paused,
}


/// Local ventilation schedule: runs the fan for a while, then pauses it.
///
/// Each phase change is issued as a command, so it goes through the same
/// validation as commands from any other transport.
pub struct TimerController {
    config: TimerConfig,
    callback: Option<CommandCallback>,
    phase: Phase,
    since: Option<Instant>,
}

impl TimerController {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            callback: None,
            phase: Phase::Running,
            since: None,
        }
    }

    fn command(&self, phase: Phase) -> StatusUpdate {
        match phase {
            Phase::Running => StatusUpdate {
                mode: Some(Mode::Manual),
                cover: Some(CoverState::Open),
                airflow: Some(self.config.airflow),
                speed: Some(self.config.percent),
                temperature: None,
            },
            Phase::Paused => StatusUpdate {
                mode: Some(Mode::Off),
                cover: Some(CoverState::Closed),
                ..Default::default()
            },
        }
    }

    fn enter(&mut self, phase: Phase, now: Instant) {
        info!("timer: {phase:?}");

        self.phase = phase;
        self.since = Some(now);

        let command = self.command(phase).to_json();
        match self.callback.as_mut() {
            Some(callback) => callback(&command),
            None => warn!("timer: no command callback registered"),
        }
    }
}

impl FanController for TimerController {
    fn begin(&mut self) -> Result<()> {
        self.since = None;
        Ok(())
    }

    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    fn notify_status(&mut self, _state: &FanState) {}

    fn poll(&mut self, now: Instant) {
        let since = match self.since {
            Some(since) => since,
            None => return self.enter(Phase::Running, now),
        };

        let elapsed = now.saturating_duration_since(since);

        match self.phase {
            Phase::Running => {
                if elapsed >= self.config.run_for && !self.config.pause_for.is_zero() {
                    self.enter(Phase::Paused, now);
                }
            },
            Phase::Paused => {
                if elapsed >= self.config.pause_for {
                    self.enter(Phase::Running, now);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn icon(&self) -> Icon {
        Icon::Timer
    }

    fn indicator_letter(&self) -> Option<char> {
        None
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controller::CommandInbox;
    use crate::protocol::state::Airflow;

    fn controller(run_for: u64, pause_for: u64) -> (TimerController, CommandInbox) {
        let config = TimerConfig {
            run_for: Duration::from_secs(run_for),
            pause_for: Duration::from_secs(pause_for),
            percent: 40,
            airflow: Airflow::In,
        };

        let inbox = CommandInbox::new();
        let mut timer = TimerController::new(config);
        timer.set_command_callback(inbox.callback());
        timer.begin().unwrap();

        (timer, inbox)
    }

    fn apply_all(inbox: &CommandInbox, state: &mut FanState) -> usize {
        let mut count = 0;
        while let Some(command) = inbox.pop() {
            state.apply_json(&command).unwrap();
            count += 1;
        }
        count
    }

    #[test]
    fn test_alternates() {
        let (mut timer, inbox) = controller(60, 120);
        let mut state = FanState::new();
        let start = Instant::now();

        timer.poll(start);
        assert_eq!(apply_all(&inbox, &mut state), 1);
        assert_eq!(state.mode(), Mode::Manual);
        assert_eq!(state.cover(), CoverState::Open);
        assert_eq!(state.speed(), 40);
        assert_eq!(state.airflow(), Airflow::In);

        timer.poll(start + Duration::from_secs(59));
        assert_eq!(apply_all(&inbox, &mut state), 0);

        timer.poll(start + Duration::from_secs(60));
        assert_eq!(apply_all(&inbox, &mut state), 1);
        assert_eq!(state.mode(), Mode::Off);
        assert_eq!(state.cover(), CoverState::Closed);

        timer.poll(start + Duration::from_secs(179));
        assert_eq!(apply_all(&inbox, &mut state), 0);

        timer.poll(start + Duration::from_secs(180));
        assert_eq!(apply_all(&inbox, &mut state), 1);
        assert_eq!(state.mode(), Mode::Manual);
    }

    #[test]
    fn test_no_pause_keeps_running() {
        let (mut timer, inbox) = controller(10, 0);
        let mut state = FanState::new();
        let start = Instant::now();

        timer.poll(start);
        timer.poll(start + Duration::from_secs(3600));
        assert_eq!(apply_all(&inbox, &mut state), 1);
        assert_eq!(state.mode(), Mode::Manual);
    }

    #[test]
    fn test_temperature_untouched() {
        let (mut timer, inbox) = controller(10, 10);
        let mut state = FanState::new();
        state.set_temperature_celsius(31);

        timer.poll(Instant::now());
        apply_all(&inbox, &mut state);
        assert_eq!(state.temperature_celsius(), 31);
    }

    #[test]
    fn test_reports_connected() {
        let (timer, _) = controller(10, 10);
        assert!(timer.is_connected());
        assert_eq!(timer.icon(), Icon::Timer);
        assert_eq!(timer.indicator_letter(), None);
    }
}
