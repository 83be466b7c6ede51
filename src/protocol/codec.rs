use bytes::{Buf, BufMut, BytesMut};
use log::{debug, trace};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::frame::Checksum;
use super::pulses::PulseTrain;


const FRAME_START: u8 = 0x7B;
const FRAME_END: u8 = 0x7D;

/// start, count (2), carrier
const HEADER_SIZE: usize = 4;

/// checksum, end
const FOOTER_SIZE: usize = 2;

/// Longer trains than this are never produced by the bridge, so a count
/// above it means the stream is out of sync.
pub const MAX_DURATIONS: usize = 1024;

fn frame_size(count: usize) -> usize {
    HEADER_SIZE + count * 2 + FOOTER_SIZE
}


/// A frame received from the IR bridge
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeFrame {
    Pulses(PulseTrain),
    Corrupted(Vec<u8>)
}


#[derive(Error, Debug)]
pub enum BridgeFramingError {
    #[error("input buffer too small")]
    BufferTooSmall,
    #[error("start of frame marker not found")]
    FrameStartNotFound,
    #[error("duration count {count} out of range")]
    TooManyDurations {
        count: usize
    },
    #[error("end of frame marker not found")]
    FrameEndNotFound,
    #[error("invalid checksum (expected {expected:x}, actual: {actual:x})")]
    InvalidChecksum {
        expected: u8,
        actual: u8,
        frame: Vec<u8>,
    },
}


/// Codec for the pulse frames exchanged with the IR bridge.
///
/// `0x7B | count: u16 LE | carrier_khz | count x u16 LE | checksum | 0x7D`,
/// where the checksum is the XOR of everything between the markers.
#[derive(Debug, Default)]
pub struct IrBridgeCodec {
    skipped: usize,
}

impl IrBridgeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_read_frame(&self, src: &mut BytesMut) -> Result<PulseTrain, BridgeFramingError> {
        if src.len() < HEADER_SIZE {
            return Err(BridgeFramingError::BufferTooSmall);
        }

        if src[0] != FRAME_START {
            return Err(BridgeFramingError::FrameStartNotFound);
        }

        let count = u16::from_le_bytes([src[1], src[2]]) as usize;
        if count > MAX_DURATIONS {
            return Err(BridgeFramingError::TooManyDurations { count });
        }

        let size = frame_size(count);
        if src.len() < size {
            return Err(BridgeFramingError::BufferTooSmall);
        }

        if src[size - 1] != FRAME_END {
            return Err(BridgeFramingError::FrameEndNotFound);
        }

        let mut frame = src.split_to(size);
        frame.advance(1); // ignore frame start

        let footer = frame.split_off(frame.len() - FOOTER_SIZE);
        let actual = footer[0];

        let expected = frame.iter().checksum();
        if expected != actual {
            return Err(BridgeFramingError::InvalidChecksum { expected, actual, frame: frame.to_vec() });
        }

        frame.advance(2); // count
        let carrier_khz = frame.get_u8();
        let durations = (0..count).map(|_| frame.get_u16_le()).collect();

        Ok(PulseTrain { carrier_khz, durations })
    }
}

impl Decoder for IrBridgeCodec {
    type Item = BridgeFrame;

    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.try_read_frame(src) {
                Ok(train) => {
                    if self.skipped > 0 {
                        debug!("resynced after skipping {} bytes", self.skipped);
                        self.skipped = 0;
                    }

                    return Ok(Some(BridgeFrame::Pulses(train)))
                },

                // need more data
                Err(BridgeFramingError::BufferTooSmall) => return Ok(None),

                Err(BridgeFramingError::InvalidChecksum { expected, actual, frame }) => {
                    trace!("invalid checksum (expected {expected:x}, actual: {actual:x}) in {} byte frame", frame.len());

                    return Ok(Some(BridgeFrame::Corrupted(frame)))
                },

                Err(BridgeFramingError::FrameStartNotFound)
                | Err(BridgeFramingError::FrameEndNotFound)
                | Err(BridgeFramingError::TooManyDurations { .. }) => {
                    // junk before a frame, or a start marker that was really part of
                    // a previous frame -- skip a byte and look again
                    src.advance(1);
                    self.skipped += 1;
                    continue;
                }
            }
        }
    }
}

impl Encoder<PulseTrain> for IrBridgeCodec {
    type Error = std::io::Error;

    fn encode(&mut self, train: PulseTrain, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let count = train.durations.len();
        if count > MAX_DURATIONS {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                BridgeFramingError::TooManyDurations { count }
            ));
        }

        dst.reserve(frame_size(count));

        let start = dst.len();

        dst.put_u8(FRAME_START);
        dst.put_u16_le(count as u16);
        dst.put_u8(train.carrier_khz);

        for duration in &train.durations {
            dst.put_u16_le(*duration);
        }

        let checksum = dst[start + 1..].iter().checksum();
        dst.put_u8(checksum);
        dst.put_u8(FRAME_END);

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;

    fn encoded(train: PulseTrain) -> BytesMut {
        let mut buf = BytesMut::new();
        IrBridgeCodec::new().encode(train, &mut buf).expect("encode");
        buf
    }

    #[test]
    fn test_codec_encode() {
        let buf = encoded(PulseTrain::new(38, vec![400, 0x1234]));

        assert_eq!(
            &buf[..],
            &[0x7B, 0x02, 0x00, 38, 0x90, 0x01, 0x34, 0x12, 0x02 ^ 38 ^ 0x90 ^ 0x01 ^ 0x34 ^ 0x12, 0x7D][..]
        );
    }

    #[test]
    fn test_codec_encode_too_long() {
        let mut buf = BytesMut::new();
        let train = PulseTrain::capture(vec![400; MAX_DURATIONS + 1]);
        assert!(IrBridgeCodec::new().encode(train, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_codec_decode() {
        let train = PulseTrain::capture(vec![800, 400, 1200]);
        let buf = encoded(train.clone());

        let mut fr = FramedRead::new(&buf[..], IrBridgeCodec::new());
        assert_eq!(fr.next().await.unwrap().unwrap(), BridgeFrame::Pulses(train));
        assert!(fr.next().await.is_none());
    }

    #[tokio::test]
    async fn test_codec_decode_empty_train() {
        let buf = encoded(PulseTrain::capture(vec![]));

        let mut fr = FramedRead::new(&buf[..], IrBridgeCodec::new());
        assert_eq!(fr.next().await.unwrap().unwrap(), BridgeFrame::Pulses(PulseTrain::capture(vec![])));
    }

    #[tokio::test]
    async fn test_codec_resync() {
        let train = PulseTrain::capture(vec![400, 800]);

        let mut buf = BytesMut::new();
        buf.put(&[0x01, 0x7B, 0x02, 0x7B, 0xFF, 0xFF][..]); // junk, including start markers
        buf.put(encoded(train.clone()));
        buf.put(encoded(train.clone()));

        let mut fr = FramedRead::new(&buf[..], IrBridgeCodec::new());
        assert_eq!(fr.next().await.unwrap().unwrap(), BridgeFrame::Pulses(train.clone()));
        assert_eq!(fr.next().await.unwrap().unwrap(), BridgeFrame::Pulses(train));
    }

    #[tokio::test]
    async fn test_codec_corrupted() {
        let train = PulseTrain::capture(vec![400, 800]);

        let mut bad = encoded(train.clone());
        bad[5] ^= 0x10;

        let mut buf = BytesMut::new();
        buf.put(bad);
        buf.put(encoded(train.clone()));

        let mut fr = FramedRead::new(&buf[..], IrBridgeCodec::new());
        assert!(matches!(fr.next().await.unwrap().unwrap(), BridgeFrame::Corrupted(_)));
        assert_eq!(fr.next().await.unwrap().unwrap(), BridgeFrame::Pulses(train));
    }

    #[tokio::test]
    async fn test_codec_split_reads() {
        let train = PulseTrain::new(38, vec![400; 200]);
        let buf = encoded(train.clone());

        let mut codec = IrBridgeCodec::new();
        let mut src = BytesMut::new();

        for chunk in buf.chunks(7) {
            src.put(chunk);
            if let Some(frame) = codec.decode(&mut src).unwrap() {
                assert_eq!(frame, BridgeFrame::Pulses(train.clone()));
                assert!(src.is_empty());
                return;
            }
        }

        panic!("frame never decoded");
    }
}
