use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{Message, S101Config};
use crate::decoder::MessageDecoder;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete S101 messages from any `Read` stream.
///
/// Handles partial reads and multi-packet reassembly internally. Recoverable
/// framing errors are returned to the caller; the reader stays usable and the
/// next call resumes at the following frame.
pub struct S101Reader<T> {
    inner: T,
    buf: BytesMut,
    decoder: MessageDecoder,
}

impl<T: Read> S101Reader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, S101Config::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: S101Config) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: MessageDecoder::new(config),
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.buf)? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.decoder.reset();
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, Bytes};

    use super::*;
    use crate::codec::{encode, encode_message, BOF, EOF};

    fn ember(slot: u8, payload: &'static [u8]) -> Message {
        Message::Ember {
            slot,
            payload: Bytes::from_static(payload),
        }
    }

    fn wire(messages: &[Message], config: &S101Config) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            encode(message, config, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_message() {
        let bytes = wire(&[ember(0, b"hello")], &S101Config::default());
        let mut reader = S101Reader::new(Cursor::new(bytes));
        assert_eq!(reader.read_message().unwrap(), ember(0, b"hello"));
    }

    #[test]
    fn read_mixed_messages() {
        let messages = [
            ember(0, b"one"),
            Message::KeepAliveRequest { slot: 0 },
            ember(1, b"two"),
            Message::KeepAliveResponse { slot: 0 },
        ];
        let bytes = wire(&messages, &S101Config::default());
        let mut reader = S101Reader::new(Cursor::new(bytes));
        for expected in messages {
            assert_eq!(reader.read_message().unwrap(), expected);
        }
    }

    #[test]
    fn read_large_split_message() {
        let payload = vec![0xFE; 5000];
        let config = S101Config::default();
        let mut buf = BytesMut::new();
        encode_message(0, &payload, &config, &mut buf).unwrap();

        let mut reader = S101Reader::new(Cursor::new(buf.to_vec()));
        match reader.read_message().unwrap() {
            Message::Ember { payload: got, .. } => assert_eq!(got.as_ref(), payload.as_slice()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[ember(4, b"slow")], &S101Config::default());
        let mut reader = S101Reader::new(ByteByByteReader { bytes, pos: 0 });
        assert_eq!(reader.read_message().unwrap(), ember(4, b"slow"));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = S101Reader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(&[ember(0, b"cut short")], &S101Config::default());
        bytes.truncate(bytes.len() - 4);
        let mut reader = S101Reader::new(Cursor::new(bytes));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn recoverable_error_then_next_message() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[BOF, 0x00, 0x01, EOF]);
        buf.put_slice(&wire(&[ember(0, b"after")], &S101Config::default()));

        let mut reader = S101Reader::new(Cursor::new(buf.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(reader.read_message().unwrap(), ember(0, b"after"));
    }

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::S101Writer::new(left);
        let mut reader = S101Reader::new(right);

        writer.send(0, b"ping").unwrap();
        assert_eq!(reader.read_message().unwrap(), ember(0, b"ping"));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[ember(8, b"ok")], &S101Config::default());
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes),
        };
        let mut framed = S101Reader::new(reader);
        assert_eq!(framed.read_message().unwrap(), ember(8, b"ok"));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
