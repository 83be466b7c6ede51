use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use colored::{ColoredString, Colorize};
use futures::StreamExt;
use url::Url;

use maxfanbridge::port::Port;
use maxfanbridge::protocol::codec::BridgeFrame;
use maxfanbridge::protocol::frame::CaptureError;
use maxfanbridge::protocol::pulses::{self, PulseTrain};
use maxfanbridge::protocol::state::{FanState, Mode};
use maxfanbridge::protocol::receiver::decode_frame;


/// Print every IR frame seen by the bridge, decoded where possible
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,

    /// Also print the raw durations of every frame
    #[arg(short, long)]
    durations: bool,
}


fn describe(train: &PulseTrain) -> ColoredString {
    let direction = if train.carrier_khz == 0 {
        "capture".to_owned()
    } else {
        format!("tx {}kHz", train.carrier_khz)
    };

    match decode_frame(&train.durations) {
        Ok(frame) => {
            let mut state = FanState::new();
            frame.apply(&mut state);

            let line = format!("{direction: <10} {state}");
            match state.mode() {
                Mode::Off => line.on_blue().bright_white(),
                Mode::Manual => line.on_green().bright_white(),
                Mode::Auto => line.on_cyan().bright_white(),
            }
        },
        Err(err @ CaptureError::Checksum { .. }) => {
            // the bytes are readable, show them
            let bytes = pulses::decode_capture(&train.durations).unwrap_or_default();
            format!("{direction: <10} {err}: {:02x?}", &bytes[10..]).on_yellow().black()
        },
        Err(err) => format!("{direction: <10} {err}").on_red().bright_white(),
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    let mut framed = Port::open(&args.port).await?.framed();

    let start_time = Instant::now();
    let mut last_frame_time: Option<Instant> = None;

    while let Some(frame) = framed.next().await {
        let now = Instant::now();
        let start_delta_ms = now.duration_since(start_time).as_millis();
        let last_frame_delta_ms = last_frame_time.map_or(0, |t| now.duration_since(t).as_millis());

        match frame? {
            BridgeFrame::Pulses(train) => {
                let total_us: u32 = train.durations.iter().map(|&d| d as u32).sum();
                let summary = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {:4} durations {:6}us", train.durations.len(), total_us);

                println!("{summary} {}", describe(&train));

                if args.durations {
                    println!("{:?}", train.durations);
                }
            },
            BridgeFrame::Corrupted(data) => {
                println!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {}", format!("corrupted bridge frame: {data:02x?}").red());
            },
        }

        last_frame_time = Some(now);
    }

    Ok(())
}
