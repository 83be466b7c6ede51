use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use maxfanbridge::app::{App, Context, ModeKind, Peripherals};
use maxfanbridge::config::Config;
use maxfanbridge::controller::{CommandCallback, FanController, Icon};
use maxfanbridge::display::{Display, LinkStatus};
use maxfanbridge::input::chord::SAMPLE_INTERVAL;
use maxfanbridge::input::{ButtonLevels, EncoderCounter, Key};
use maxfanbridge::protocol::frame::{Checksum, RawFrame};
use maxfanbridge::protocol::patterns::{speed_pattern, TICK_US, WARMUP};
use maxfanbridge::protocol::pulses::{self, PulseTrain};
use maxfanbridge::protocol::receiver::CaptureSource;
use maxfanbridge::protocol::remote::IrTransmitter;
use maxfanbridge::protocol::state::{Airflow, CoverState, FanState, Mode};
use maxfanbridge::protocol::status::CommandError;


#[derive(Default)]
struct Air {
    captures: VecDeque<PulseTrain>,
    sent: Vec<PulseTrain>,
}

#[derive(Clone, Default)]
struct FakeIr(Rc<RefCell<Air>>);

impl CaptureSource for FakeIr {
    fn try_capture(&mut self) -> Option<PulseTrain> {
        self.0.borrow_mut().captures.pop_front()
    }
}

impl IrTransmitter for FakeIr {
    fn transmit(&mut self, train: PulseTrain) {
        self.0.borrow_mut().sent.push(train);
    }
}


#[derive(Default)]
struct Broker {
    pending: VecDeque<String>,
    published: Vec<FanState>,
}

struct FakeController {
    broker: Rc<RefCell<Broker>>,
    callback: Option<CommandCallback>,
}

impl FanController for FakeController {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    fn notify_status(&mut self, state: &FanState) {
        let mut broker = self.broker.borrow_mut();
        if broker.published.last() != Some(state) {
            broker.published.push(*state);
        }
    }

    fn poll(&mut self, _now: Instant) {
        let pending: Vec<String> = self.broker.borrow_mut().pending.drain(..).collect();
        if let Some(callback) = self.callback.as_mut() {
            for command in pending {
                callback(&command);
            }
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn icon(&self) -> Icon {
        Icon::Broker
    }

    fn indicator_letter(&self) -> Option<char> {
        None
    }
}


#[derive(Default)]
struct Screen {
    errors: Vec<CommandError>,
    menu: Vec<String>,
    power_save: bool,
}

struct FakeDisplay(Rc<RefCell<Screen>>);

impl Display for FakeDisplay {
    fn update(&mut self, _state: &FanState, _link: LinkStatus, _encoder_position: i32, _now: Instant) {}

    fn show_error(&mut self, error: CommandError, _now: Instant) {
        self.0.borrow_mut().errors.push(error);
    }

    fn show_menu(&mut self, lines: &[String]) {
        self.0.borrow_mut().menu = lines.to_vec();
    }

    fn clear(&mut self) {}

    fn set_power_save(&mut self, enabled: bool) {
        self.0.borrow_mut().power_save = enabled;
    }
}


struct Harness {
    app: App,
    air: FakeIr,
    broker: Rc<RefCell<Broker>>,
    screen: Rc<RefCell<Screen>>,
    levels: Arc<ButtonLevels>,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        let now = Instant::now();
        let air = FakeIr::default();
        let broker = Rc::new(RefCell::new(Broker::default()));
        let screen = Rc::new(RefCell::new(Screen::default()));
        let levels = Arc::new(ButtonLevels::new());

        let peripherals = Peripherals {
            ir: Box::new(air.clone()),
            controller: Box::new(FakeController { broker: broker.clone(), callback: None }),
            display: Box::new(FakeDisplay(screen.clone())),
            encoder: Arc::new(EncoderCounter::new()),
            levels: levels.clone(),
        };

        let config_path = PathBuf::from("integration-unused.toml");
        let mut app = App::new(Context::new(peripherals, Config::default(), config_path, now));
        app.begin();

        Self { app, air, broker, screen, levels, now }
    }

    fn step(&mut self) {
        self.now += SAMPLE_INTERVAL;
        self.app.tick(self.now);
    }

    fn command(&mut self, json: &str) {
        self.broker.borrow_mut().pending.push_back(json.to_owned());
    }

    fn state(&self) -> FanState {
        self.app.context().state
    }
}


/// What a receiver reports for `state`: the encoded frame with some timing
/// error, cut off before the trailing filler byte.
fn capture_of(state: &FanState) -> PulseTrain {
    let wire = RawFrame::new(state).to_wire().unwrap();
    let mut durations = pulses::encode(&wire, TICK_US);

    durations.truncate(durations.len() - 2);
    for (i, d) in durations.iter_mut().enumerate() {
        *d = if i % 2 == 0 { *d + 70 } else { *d - 70 };
    }

    PulseTrain::capture(durations)
}


#[test]
fn test_command_is_transmitted_after_warm_up() {
    let mut h = Harness::new();

    h.command(r#"{"mode":"MANUAL","speed":50}"#);
    h.step();

    assert_eq!(h.state().mode(), Mode::Manual);
    assert_eq!(h.state().cover(), CoverState::Open);
    assert_eq!(h.broker.borrow().published.last(), Some(&h.state()));
    assert!(h.air.0.borrow().sent.is_empty());

    h.now += WARMUP;
    h.step();

    let air = h.air.0.borrow();
    assert_eq!(air.sent.len(), 1);
    assert_eq!(air.sent[0].carrier_khz, 38);

    let bytes = pulses::decode(&air.sent[0].durations, TICK_US).unwrap();
    assert_eq!(bytes[10] & 0x09, 0x09);
    assert_eq!(bytes[11], 0x59);
    assert_eq!(Some(bytes[11]), speed_pattern(50));
    assert_eq!(bytes[15], bytes[10..15].iter().checksum());
}

#[test]
fn test_capture_updates_state_and_transport() {
    let mut h = Harness::new();
    h.step();

    let mut remote = FanState::new();
    remote.set_mode(Mode::Auto);
    remote.set_speed(30);
    remote.set_temperature_celsius(18);
    remote.set_airflow(Airflow::Out);

    h.air.0.borrow_mut().captures.push_back(capture_of(&remote));
    h.step();

    assert_eq!(h.state(), remote);
    assert_eq!(h.app.context().receiver.accepted(), 1);

    // published on the tick after the one that decoded it
    h.step();
    assert_eq!(h.broker.borrow().published.last(), Some(&remote));
}

#[test]
fn test_bad_capture_does_not_block_the_next() {
    let mut h = Harness::new();
    h.step();

    let mut remote = FanState::new();
    remote.set_mode(Mode::Manual);

    {
        let mut air = h.air.0.borrow_mut();
        air.captures.push_back(PulseTrain::capture(vec![400, 800, 400, 1200]));
        air.captures.push_back(capture_of(&remote));
    }
    h.step();

    assert_eq!(h.state(), remote);
    assert_eq!(h.app.context().receiver.rejected(), 1);
    assert_eq!(h.app.context().receiver.accepted(), 1);
}

#[test]
fn test_invalid_command_is_reported() {
    let mut h = Harness::new();
    h.step();

    h.command(r#"{"mode":"MANUAL","speed":"fast"}"#);
    h.command("not json");
    h.step();

    assert_eq!(h.screen.borrow().errors, [CommandError::InvalidSpeed, CommandError::Malformed]);
    assert_eq!(h.state(), FanState::new());
}

#[test]
fn test_panel_modes() {
    let mut h = Harness::new();
    h.step();

    h.levels.set(Key::Mode, true);
    h.levels.set(Key::Cover, true);
    h.step();
    h.levels.set(Key::Mode, false);
    h.levels.set(Key::Cover, false);
    h.step();
    h.step();

    assert_eq!(h.app.mode(), ModeKind::Config);
    assert_eq!(h.screen.borrow().menu.len(), 2);

    // leave without saving
    h.levels.set(Key::Cover, true);
    h.step();
    h.levels.set(Key::Cover, false);
    h.step();
    assert_eq!(h.app.mode(), ModeKind::Standard);
    h.step();

    // the link keeps running while the screen is dark
    h.now += Duration::from_secs(20);
    h.step();
    h.step();
    assert_eq!(h.app.mode(), ModeKind::ScreenDark);
    assert!(h.screen.borrow().power_save);

    h.command(r#"{"mode":"AUTO"}"#);
    h.step();
    assert_eq!(h.state().mode(), Mode::Auto);
    assert_eq!(h.app.mode(), ModeKind::ScreenDark);
}
