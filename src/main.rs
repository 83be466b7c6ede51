use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{error, info};
use tokio::io::BufReader;
use tokio::time::{interval, MissedTickBehavior};
use url::Url;

use maxfanbridge::app::{App, Context, Peripherals};
use maxfanbridge::config::{Config, Connection, CONFIG_FILENAME};
use maxfanbridge::controller::{BleController, FanController, MqttController, NilController, TimerController};
use maxfanbridge::display::ConsoleDisplay;
use maxfanbridge::input::{ButtonLevels, EncoderCounter};
use maxfanbridge::input::panel::Panel;
use maxfanbridge::link::IrLink;
use maxfanbridge::port::Port;


const TICK_INTERVAL: Duration = Duration::from_millis(10);


/// Bridge between a MaxFan roof vent (over an IR bridge) and a remote-control
/// transport.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the IR bridge port
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Read panel input (`+`, `-`, `enc`, `mode`, `cover`, `mode+cover`) from stdin
    #[arg(long)]
    panel: bool,
}


fn controller(config: &Config) -> Box<dyn FanController> {
    match config.connection {
        Connection::None => Box::new(NilController),
        Connection::Timer => Box::new(TimerController::new(config.timer.clone())),
        Connection::Mqtt => Box::new(MqttController::new(config.mqtt.clone(), &config.device_name)),
        Connection::Ble => Box::new(BleController::new(config.ble.clone(), &config.device_name)),
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    let boot = Instant::now();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!("connection: {}", config.connection);

    let port = Port::open(&args.port).await?;
    let (link, mut link_task) = IrLink::spawn(port.framed());

    let encoder = Arc::new(EncoderCounter::new());
    let levels = Arc::new(ButtonLevels::new());

    if args.panel {
        let _panel = Panel::new(encoder.clone(), levels.clone()).spawn(BufReader::new(tokio::io::stdin()));
    }

    let peripherals = Peripherals {
        ir: Box::new(link),
        controller: controller(&config),
        display: Box::new(ConsoleDisplay::new()),
        encoder,
        levels,
    };

    let mut app = App::new(Context::new(peripherals, config, args.config, boot));
    app.begin();

    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => app.tick(Instant::now()),

            result = &mut link_task => {
                match result? {
                    Ok(()) => info!("IR port closed"),
                    Err(err) => error!("IR port failed: {err:#}"),
                }
                return Ok(());
            }
        }
    }
}
