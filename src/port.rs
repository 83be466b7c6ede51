use futures::{Sink, Stream};
use tokio::net::TcpStream;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Framed;
use url::Url;
use anyhow::{Result, Context, bail};

use crate::protocol::codec::{BridgeFrame, IrBridgeCodec};
use crate::protocol::pulses::PulseTrain;


const BAUD_RATE: u32 = 115200;


/// Connection to the IR bridge.
pub enum Port {
    Serial(SerialStream),
    TcpRaw(TcpStream)
}


pub trait PortStream: Stream<Item = std::io::Result<BridgeFrame>> + Sink<PulseTrain, Error = std::io::Error> + Send + Unpin {}

impl<T> PortStream for T
where
    T: Stream<Item = std::io::Result<BridgeFrame>> + Sink<PulseTrain, Error = std::io::Error> + Send + Unpin,
{}


impl Port {
    /// Open a `serial:///device/path` or `tcp+raw://host:port` url.
    pub async fn open(url: &Url) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = url.path();

                let port = tokio_serial::new(path, BAUD_RATE)
                    .data_bits(tokio_serial::DataBits::Eight)
                    .stop_bits(tokio_serial::StopBits::One)
                    .parity(tokio_serial::Parity::None)
                    .open_native_async()
                    .with_context(|| format!("failed to open serial port {path}"))
                    ?;

                Ok(Self::Serial(port))
            },
            "tcp+raw" => {
                let host = url.host_str()
                    .with_context(|| format!("tcp+raw requires a host to be specified in the url: {url}"))?;

                let port = url.port()
                    .with_context(|| format!("tcp+raw requires a port number to be specified in the url: {url}"))?;

                let stream = TcpStream::connect((host, port)).await
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                stream.set_nodelay(true)?;

                Ok(Self::TcpRaw(stream))
            },
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }

    pub fn framed(self) -> Box<dyn PortStream> {
        match self {
            Port::Serial(port) => Box::new(Framed::new(port, IrBridgeCodec::new())),
            Port::TcpRaw(stream) => Box::new(Framed::new(stream, IrBridgeCodec::new())),
        }
    }
}
