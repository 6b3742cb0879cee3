use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{
    encode_frame, message_frames, Frame, Message, S101Config, EMBER_FRAME_OVERHEAD,
};
use crate::error::{FrameError, Result};

/// Writes S101 messages to any `Write` stream.
///
/// Each frame goes out in its own write, so a multi-packet message never sits
/// in memory in escaped form. Packets are cut small enough that even a payload
/// made entirely of escaped bytes stays within `max_frame_size`, which keeps a
/// peer using the same configuration from rejecting the frame.
pub struct S101Writer<T> {
    inner: T,
    frame: BytesMut,
    config: S101Config,
    packet_payload: usize,
    frames_written: u64,
}

impl<T: Write> S101Writer<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, S101Config::default())
    }

    pub fn with_config(inner: T, config: S101Config) -> Self {
        let packet_payload = packet_payload_limit(&config);
        Self {
            inner,
            frame: BytesMut::with_capacity(escaped_frame_bound(packet_payload)),
            config,
            packet_payload,
            frames_written: 0,
        }
    }

    /// Send an EmBER payload on a slot and flush. Returns the number of packets used.
    pub fn send(&mut self, slot: u8, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: payload.len(),
                max: self.config.max_message_size,
            });
        }

        let mut packets = 0;
        for frame in message_frames(slot, payload, self.packet_payload) {
            self.write_frame(&frame)?;
            packets += 1;
        }
        self.flush()?;
        trace!(slot, size = payload.len(), packets, "sent EmBER message");
        Ok(packets)
    }

    pub fn keep_alive_request(&mut self, slot: u8) -> Result<()> {
        self.write_frame(&Frame::keep_alive_request(slot))?;
        self.flush()
    }

    pub fn keep_alive_response(&mut self, slot: u8) -> Result<()> {
        self.write_frame(&Frame::keep_alive_response(slot))?;
        self.flush()
    }

    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Ember { slot, payload } => self.send(*slot, payload).map(drop),
            Message::KeepAliveRequest { slot } => self.keep_alive_request(*slot),
            Message::KeepAliveResponse { slot } => self.keep_alive_response(*slot),
        }
    }

    /// Largest payload put into one packet.
    pub fn packet_payload(&self) -> usize {
        self.packet_payload
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frame.clear();
        encode_frame(frame, &mut self.frame)?;
        if self.frame.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: self.frame.len(),
                max: self.config.max_frame_size,
            });
        }
        self.inner.write_all(&self.frame).map_err(write_error)?;
        self.frames_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(write_error)
    }
}

// Delimiters plus every byte in between escaped.
fn escaped_frame_bound(payload: usize) -> usize {
    2 + 2 * (EMBER_FRAME_OVERHEAD + payload)
}

fn packet_payload_limit(config: &S101Config) -> usize {
    let fitting = (config.max_frame_size.saturating_sub(2) / 2).saturating_sub(EMBER_FRAME_OVERHEAD);
    config.max_packet_payload.min(fitting).max(1)
}

fn write_error(err: std::io::Error) -> FrameError {
    if err.kind() == ErrorKind::WriteZero {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;

    use super::*;
    use crate::codec::{decode_frame, Command, PacketFlags, INVALID_START};
    use crate::reader::S101Reader;

    /// Keeps every write separately so frame boundaries stay visible.
    #[derive(Default)]
    struct Wire {
        writes: Vec<Vec<u8>>,
        flushes: usize,
        closed: bool,
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.closed {
                return Ok(0);
            }
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn only_frame(bytes: &[u8], config: &S101Config) -> Frame {
        let mut buf = BytesMut::from(bytes);
        let frame = decode_frame(&mut buf, config).unwrap().unwrap();
        assert!(buf.is_empty(), "write held more than one frame");
        frame
    }

    fn packet_flags(frame: &Frame) -> PacketFlags {
        match &frame.command {
            Command::Ember(packet) => packet.flags,
            other => panic!("expected an EmBER packet, got {other:?}"),
        }
    }

    #[test]
    fn small_message_is_one_packet() {
        let mut writer = S101Writer::new(Wire::default());
        assert_eq!(writer.send(1, b"hello").unwrap(), 1);

        let frame = only_frame(&writer.inner.writes[0], &S101Config::default());
        assert_eq!(frame.slot, 1);
        assert_eq!(packet_flags(&frame), PacketFlags::SINGLE);
        assert_eq!(writer.inner.flushes, 1);
    }

    #[test]
    fn multi_packet_message_goes_out_one_frame_per_write() {
        let config = S101Config {
            max_packet_payload: 2,
            ..S101Config::default()
        };
        let mut writer = S101Writer::with_config(Wire::default(), config.clone());
        assert_eq!(writer.send(3, b"abcde").unwrap(), 3);

        let flags: Vec<u8> = writer
            .inner
            .writes
            .iter()
            .map(|write| packet_flags(&only_frame(write, &config)).0)
            .collect();
        assert_eq!(flags, [PacketFlags::FIRST, 0, PacketFlags::LAST]);
        assert_eq!(writer.inner.flushes, 1);
        assert_eq!(writer.frames_written(), 3);
    }

    #[test]
    fn packets_shrink_until_escaped_frames_fit() {
        let config = S101Config {
            max_frame_size: escaped_frame_bound(4),
            ..S101Config::default()
        };
        let mut writer = S101Writer::with_config(Wire::default(), config.clone());
        assert_eq!(writer.packet_payload(), 4);

        let payload = vec![0xFF; 10];
        assert_eq!(writer.send(0, &payload).unwrap(), 3);
        assert!(writer
            .inner
            .writes
            .iter()
            .all(|write| write.len() <= config.max_frame_size));

        let wire: Vec<u8> = writer.inner.writes.concat();
        let mut reader = S101Reader::with_config(Cursor::new(wire), config);
        assert_eq!(
            reader.read_message().unwrap(),
            Message::Ember {
                slot: 0,
                payload: Bytes::from(payload),
            }
        );
    }

    #[test]
    fn escape_expansion_is_bounded_by_two() {
        let payload = vec![INVALID_START; 16];
        let mut buf = BytesMut::new();
        let frame = message_frames(0, &payload, 16).next().unwrap();
        encode_frame(&frame, &mut buf).unwrap();
        assert!(buf.len() <= escaped_frame_bound(16));
        assert!(buf.len() > 2 * payload.len());
    }

    #[test]
    fn empty_message_is_a_single_empty_packet() {
        let mut writer = S101Writer::new(Wire::default());
        assert_eq!(writer.send(0, b"").unwrap(), 1);

        let flags = packet_flags(&only_frame(&writer.inner.writes[0], &S101Config::default()));
        assert!(flags.is_first() && flags.is_last() && flags.is_empty());
    }

    #[test]
    fn keep_alive_frames() {
        let mut writer = S101Writer::new(Wire::default());
        writer.keep_alive_request(2).unwrap();
        writer
            .write_message(&Message::KeepAliveResponse { slot: 2 })
            .unwrap();

        let config = S101Config::default();
        let commands: Vec<Command> = writer
            .inner
            .writes
            .iter()
            .map(|write| only_frame(write, &config).command)
            .collect();
        assert_eq!(commands, [Command::KeepAliveRequest, Command::KeepAliveResponse]);
        assert_eq!(writer.inner.flushes, 2);
    }

    #[test]
    fn oversized_message_is_rejected_before_writing() {
        let config = S101Config {
            max_message_size: 4,
            ..S101Config::default()
        };
        let mut writer = S101Writer::with_config(Wire::default(), config);
        let err = writer.send(1, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { .. }));
        assert!(writer.inner.writes.is_empty());
    }

    #[test]
    fn closed_stream_is_reported() {
        let mut writer = S101Writer::new(Wire {
            closed: true,
            ..Wire::default()
        });
        let err = writer.send(1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(writer.frames_written(), 0);
    }
}
