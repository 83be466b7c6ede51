use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures::SinkExt;
use rand::Rng;
use tokio::time::sleep;
use url::Url;

use maxfanbridge::port::Port;
use maxfanbridge::protocol::frame::RawFrame;
use maxfanbridge::protocol::patterns::TICK_US;
use maxfanbridge::protocol::pulses::{self, PulseTrain};
use maxfanbridge::protocol::state::{Airflow, CoverState, FanState, Mode};


/// Emulator for the MaxFan handheld remote
///
/// Sends the frame for the given state as a capture, the way an IR receiver
/// would report it: with timing jitter and optionally a cut-off tail.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,

    /// OFF, MANUAL or AUTO
    #[arg(long, default_value = "MANUAL")]
    mode: Mode,

    /// OPEN or CLOSED
    #[arg(long)]
    cover: Option<CoverState>,

    /// IN or OUT
    #[arg(long, default_value = "IN")]
    airflow: Airflow,

    /// Percent, multiple of 10
    #[arg(long, default_value_t = 50)]
    speed: i32,

    /// Degrees Celsius
    #[arg(long, default_value_t = 22)]
    temperature: i32,

    /// Maximum timing error per duration, in microseconds
    #[arg(long, default_value_t = 60)]
    jitter: u16,

    /// Durations to drop from the end, as a receiver that stops early would
    #[arg(long, default_value_t = 0)]
    truncate: usize,

    /// Number of times to send
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Seconds between repeats
    #[arg(long, default_value_t = 3)]
    interval: u64,
}


fn capture(state: &FanState, jitter: u16, truncate: usize) -> Result<PulseTrain> {
    let wire = RawFrame::new(state).to_wire()?;
    let mut durations = pulses::encode(&wire, TICK_US);

    durations.truncate(durations.len().saturating_sub(truncate));

    let mut rng = rand::thread_rng();
    for duration in durations.iter_mut() {
        let error = rng.gen_range(-(jitter as i32)..=jitter as i32);
        *duration = (*duration as i32 + error).max(1) as u16;
    }

    Ok(PulseTrain::capture(durations))
}


#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    let mut state = FanState::new();
    state.set_mode(args.mode);
    if let Some(cover) = args.cover {
        state.set_cover(cover);
    }
    state.set_airflow(args.airflow);
    state.set_speed(args.speed);
    state.set_temperature_celsius(args.temperature);

    let mut framed = Port::open(&args.port).await?.framed();

    for n in 0..args.repeat {
        if n > 0 {
            sleep(Duration::from_secs(args.interval)).await;
        }

        let train = capture(&state, args.jitter, args.truncate)?;
        println!("sending {state} ({} durations)", train.durations.len());

        framed.send(train).await?;
    }

    Ok(())
}
