use anyhow::Result;
use clap::Parser;
use futures::{SinkExt, TryStreamExt};
use url::Url;

use maxfanbridge::port::{Port, PortStream};
use maxfanbridge::protocol::codec::BridgeFrame;
use maxfanbridge::protocol::pulses::PulseTrain;
use maxfanbridge::protocol::receiver::decode_frame;
use maxfanbridge::protocol::remote::pulse_train;
use maxfanbridge::protocol::state::FanState;


/// Emulator for a MaxFan roof vent
///
/// Adopts the state of every valid IR transmission seen on the bridge.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,

    /// Send every adopted state back as a capture, as a receiver next to
    /// the fan would see it
    #[arg(long)]
    echo: bool,
}


#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    let framed = Port::open(&args.port).await?.framed();

    fan_emulator(framed, args.echo).await
}


async fn fan_emulator(mut port: Box<dyn PortStream>, echo: bool) -> Result<()> {
    let mut state = FanState::new();
    println!("Fan starting as {state}");

    loop {
        let train = match port.try_next().await? {
            Some(BridgeFrame::Pulses(train)) => train,
            Some(BridgeFrame::Corrupted(data)) => {
                println!("corrupted bridge frame: {data:02x?}");
                continue;
            },
            // stream reached the end
            None => return Ok(()),
        };

        // captures come from other receivers, the fan only reacts to light
        if train.carrier_khz == 0 {
            continue;
        }

        let frame = match decode_frame(&train.durations) {
            Ok(frame) => frame,
            Err(err) => {
                println!("ignored transmission: {err}");
                continue;
            }
        };

        let previous = state;
        frame.apply(&mut state);

        if state == previous {
            println!("beep (unchanged)");
            continue;
        }

        println!("beep: {state}");

        if echo {
            let tx = pulse_train(&state)?;
            port.send(PulseTrain::capture(tx.durations)).await?;
        }
    }
}
