//! The cooperative main loop and its three screen modes.
//!
//! Every tick services the fan link (transport commands, transmit, receive)
//! regardless of the active mode, then lets the active mode handle input and
//! the display. Mode switches requested during a tick are applied at the start
//! of the next one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};

use crate::config::Config;
use crate::controller::{CommandInbox, FanController};
use crate::display::{Display, LinkStatus};
use crate::input::{ButtonLevels, ChordInput, EncoderCounter};
use crate::link::IrPort;
use crate::protocol::receiver::IrReceiver;
use crate::protocol::remote::IrRemote;
use crate::protocol::state::FanState;

pub mod config;
pub mod screen_dark;
pub mod standard;

use self::config::ConfigMode;
use self::screen_dark::ScreenDarkMode;
use self::standard::StandardMode;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Standard,
    Config,
    ScreenDark,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeAction {
    Stay,
    Switch(ModeKind),
}


pub trait AppMode {
    /// Called on the first tick in this mode; draws the whole screen.
    fn enter(&mut self, ctx: &mut Context, now: Instant);

    fn tick(&mut self, ctx: &mut Context, now: Instant) -> ModeAction;
}


/// The peripherals the loop runs against.
pub struct Peripherals {
    pub ir: Box<dyn IrPort>,
    pub controller: Box<dyn FanController>,
    pub display: Box<dyn Display>,
    pub encoder: Arc<EncoderCounter>,
    pub levels: Arc<ButtonLevels>,
}


/// Everything the modes share. Owned by [`App`] and handed to the active mode
/// by reference.
pub struct Context {
    pub state: FanState,

    pub receiver: IrReceiver,
    pub remote: IrRemote,
    pub ir: Box<dyn IrPort>,

    pub controller: Box<dyn FanController>,
    pub inbox: CommandInbox,
    was_connected: bool,

    pub display: Box<dyn Display>,
    pub encoder: Arc<EncoderCounter>,
    pub input: ChordInput,

    /// Snapshot taken at startup
    pub config: Config,
    pub config_path: PathBuf,

    last_activity: Instant,
}

impl Context {
    pub fn new(peripherals: Peripherals, config: Config, config_path: PathBuf, boot: Instant) -> Self {
        Self {
            state: FanState::new(),
            receiver: IrReceiver::new(),
            remote: IrRemote::new(boot),
            ir: peripherals.ir,
            controller: peripherals.controller,
            inbox: CommandInbox::new(),
            was_connected: false,
            display: peripherals.display,
            encoder: peripherals.encoder,
            input: ChordInput::new(peripherals.levels),
            config,
            config_path,
            last_activity: boot,
        }
    }

    /// Record local input, which postpones the display timeout.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        match self.config.display_timeout() {
            Some(timeout) => now.saturating_duration_since(self.last_activity) >= timeout,
            None => false,
        }
    }

    pub fn link_status(&self) -> LinkStatus {
        LinkStatus {
            icon: self.controller.icon(),
            connected: self.controller.is_connected(),
            indicator: self.controller.indicator_letter(),
        }
    }

    pub fn update_display(&mut self, now: Instant) {
        let link = self.link_status();
        let position = self.encoder.position();
        self.display.update(&self.state, link, position, now);
    }

    /// Transports, then transmit, then receive. A state decoded here is only
    /// transmitted on a later tick.
    fn service(&mut self, now: Instant) {
        self.controller.poll(now);

        let connected = self.controller.is_connected();
        if connected != self.was_connected {
            info!("transport {}", if connected { "connected" } else { "disconnected" });
            self.was_connected = connected;
        }

        while let Some(command) = self.inbox.pop() {
            if let Err(err) = self.state.apply_json(&command) {
                warn!("rejected command {command:?}: {err} ({})", err.code());
                self.display.show_error(err, now);
            }
        }

        self.controller.notify_status(&self.state);

        self.remote.send(&self.state, now, self.ir.as_mut());
        self.receiver.update(&mut self.state, self.ir.as_mut());
    }
}


pub struct App {
    ctx: Context,

    standard: StandardMode,
    config: ConfigMode,
    screen_dark: ScreenDarkMode,

    active: ModeKind,
    entered: bool,
}

impl App {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            standard: StandardMode::new(),
            config: ConfigMode::new(),
            screen_dark: ScreenDarkMode::new(),
            active: ModeKind::Standard,
            entered: false,
        }
    }

    /// Start the transport. A transport that fails to start stays
    /// disconnected; the rest of the loop runs regardless.
    pub fn begin(&mut self) {
        let callback = self.ctx.inbox.callback();
        self.ctx.controller.set_command_callback(callback);

        if let Err(err) = self.ctx.controller.begin() {
            error!("failed to start transport: {err:#}");
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let ctx = &mut self.ctx;

        let mode: &mut dyn AppMode = match self.active {
            ModeKind::Standard => &mut self.standard,
            ModeKind::Config => &mut self.config,
            ModeKind::ScreenDark => &mut self.screen_dark,
        };

        if !self.entered {
            mode.enter(ctx, now);
            self.entered = true;
        }

        ctx.input.tick(now);
        ctx.service(now);

        if let ModeAction::Switch(next) = mode.tick(ctx, now) {
            if next != self.active {
                info!("{:?} -> {:?}", self.active, next);
                self.active = next;
                self.entered = false;
            }
        }
    }

    pub fn mode(&self) -> ModeKind {
        self.active
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}
