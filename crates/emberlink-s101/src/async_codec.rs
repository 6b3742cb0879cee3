use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{encode, Message, S101Config};
use crate::decoder::MessageDecoder;
use crate::error::FrameError;

/// `tokio_util` codec producing complete S101 messages.
///
/// A `FramedRead` stops at the first error it sees, so recoverable framing
/// errors are logged and skipped here; only a run of more than
/// `max_consecutive_errors` of them, or an I/O error, ends the stream.
#[derive(Debug)]
pub struct S101Codec {
    decoder: MessageDecoder,
    config: S101Config,
}

impl S101Codec {
    pub fn new() -> Self {
        Self::with_config(S101Config::default())
    }

    pub fn with_config(config: S101Config) -> Self {
        Self {
            decoder: MessageDecoder::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &S101Config {
        &self.config
    }
}

impl Default for S101Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for S101Codec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode_recovering(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if !src.is_empty() {
            debug!(remaining = src.len(), "discarding unterminated frame at end of stream");
            src.clear();
        }
        self.decoder.reset();
        Ok(None)
    }
}

impl Encoder<Message> for S101Codec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode(&item, &self.config, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn messages_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut sink = FramedWrite::new(client, S101Codec::with_config(S101Config {
            max_packet_payload: 16,
            ..S101Config::default()
        }));
        let mut stream = FramedRead::new(server, S101Codec::new());

        let payload = Bytes::from((0u8..=255).collect::<Vec<u8>>());
        sink.send(Message::Ember {
            slot: 0,
            payload: payload.clone(),
        })
        .await
        .unwrap();
        sink.send(Message::KeepAliveRequest { slot: 0 }).await.unwrap();
        drop(sink);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, Message::Ember { slot: 0, payload });
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second, Message::KeepAliveRequest { slot: 0 });
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn decode_skips_corrupt_frames() {
        let mut codec = S101Codec::new();
        let mut buf = BytesMut::from(&[0xFE, 0x00, 0xF9, 0xFF][..]);
        codec
            .encode(Message::KeepAliveResponse { slot: 1 }, &mut buf)
            .unwrap();

        let message = codec.decode(&mut buf).unwrap();
        assert_eq!(message, Some(Message::KeepAliveResponse { slot: 1 }));
    }

    #[test]
    fn decode_eof_discards_partial_frame() {
        let mut codec = S101Codec::new();
        let mut buf = BytesMut::from(&[0xFE, 0x00, 0x0E][..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }
}
