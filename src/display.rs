use std::time::{Duration, Instant};

use log::{debug, info};

use crate::controller::Icon;
use crate::protocol::state::FanState;
use crate::protocol::status::CommandError;


/// How long a command error stays on screen.
pub const ERROR_DURATION: Duration = Duration::from_secs(3);


/// Transport status shown alongside the fan state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkStatus {
    pub icon: Icon,
    pub connected: bool,
    pub indicator: Option<char>,
}


/// Status display sink.
pub trait Display {
    fn update(&mut self, state: &FanState, link: LinkStatus, encoder_position: i32, now: Instant);

    /// Show `error` instead of the status for [`ERROR_DURATION`].
    fn show_error(&mut self, error: CommandError, now: Instant);

    fn show_menu(&mut self, lines: &[String]);

    /// Forget what is on screen so the next update draws everything.
    fn clear(&mut self);

    fn set_power_save(&mut self, enabled: bool);
}


/// Renders to the log, one line whenever the content changes.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    rendered: Option<String>,
    error: Option<(CommandError, Instant)>,
    power_save: bool,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    fn draw(&mut self, content: String) {
        if self.power_save || self.rendered.as_ref() == Some(&content) {
            return;
        }

        info!("{content}");
        self.rendered = Some(content);
    }
}

pub fn render_status(state: &FanState, link: LinkStatus, encoder_position: i32) -> String {
    let icon = match link.icon {
        Icon::None => "",
        Icon::Timer => " [timer]",
        Icon::Broker => " [mqtt]",
        Icon::Ble => " [ble]",
    };

    let connection = match (link.icon, link.connected, link.indicator) {
        (Icon::None, _, _) => String::new(),
        (_, true, _) => " connected".to_owned(),
        (_, false, Some(letter)) => format!(" {letter}"),
        (_, false, None) => " offline".to_owned(),
    };

    format!(
        "{} {}% {}C cover {} airflow {}{icon}{connection} ({encoder_position})",
        state.mode(),
        state.speed(),
        state.temperature_celsius(),
        state.cover(),
        state.airflow(),
    )
}

impl Display for ConsoleDisplay {
    fn update(&mut self, state: &FanState, link: LinkStatus, encoder_position: i32, now: Instant) {
        if let Some((_, until)) = self.error {
            if now < until {
                return;
            }
            self.error = None;
        }

        self.draw(render_status(state, link, encoder_position));
    }

    fn show_error(&mut self, error: CommandError, now: Instant) {
        self.error = Some((error, now + ERROR_DURATION));
        self.draw(format!("{}: {} ({})", error.caption(), error.text(), error.code()));
    }

    fn show_menu(&mut self, lines: &[String]) {
        self.error = None;
        self.draw(lines.join(" | "));
    }

    fn clear(&mut self) {
        self.rendered = None;
    }

    fn set_power_save(&mut self, enabled: bool) {
        if self.power_save != enabled {
            debug!("display {}", if enabled { "off" } else { "on" });
        }

        self.power_save = enabled;
        if enabled {
            self.rendered = None;
        }
    }
}
