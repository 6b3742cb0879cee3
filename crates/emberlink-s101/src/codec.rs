use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Start-of-frame delimiter.
pub const BOF: u8 = 0xFE;
/// End-of-frame delimiter.
pub const EOF: u8 = 0xFF;
/// Escape marker; the following byte is XORed with [`ESCAPE_XOR`].
pub const CE: u8 = 0xFD;
pub const ESCAPE_XOR: u8 = 0x20;
/// Every byte at or above this value is escaped inside a frame.
pub const INVALID_START: u8 = 0xF8;

pub const MESSAGE_TYPE_EMBER: u8 = 0x0E;
pub const COMMAND_EMBER: u8 = 0x00;
pub const COMMAND_KEEP_ALIVE_REQUEST: u8 = 0x01;
pub const COMMAND_KEEP_ALIVE_RESPONSE: u8 = 0x02;
pub const VERSION: u8 = 0x01;

/// Glow data type descriptor.
pub const DTD_GLOW: u8 = 0x01;
/// Application bytes announcing Glow DTD version 2.31 (minor, major).
pub const GLOW_APP_BYTES: [u8; 2] = [0x1F, 0x02];

/// slot + message type + command + version.
pub const HEADER_SIZE: usize = 4;
/// flags + dtd + app-bytes count.
pub const EMBER_HEADER_SIZE: usize = 3;
pub const CRC_SIZE: usize = 2;
/// Unescaped bytes of a Glow data frame besides its payload.
pub const EMBER_FRAME_OVERHEAD: usize =
    HEADER_SIZE + EMBER_HEADER_SIZE + GLOW_APP_BYTES.len() + CRC_SIZE;

pub const DEFAULT_MAX_PACKET_PAYLOAD: usize = 1024;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 16;

/// Packet flags of an EmBER data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketFlags(pub u8);

impl PacketFlags {
    pub const FIRST: u8 = 0x80;
    pub const LAST: u8 = 0x40;
    pub const EMPTY: u8 = 0x20;

    /// A message that fits in one packet.
    pub const SINGLE: PacketFlags = PacketFlags(Self::FIRST | Self::LAST);

    pub fn is_first(self) -> bool {
        self.0 & Self::FIRST != 0
    }

    pub fn is_last(self) -> bool {
        self.0 & Self::LAST != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::EMPTY != 0
    }

    /// Returns true if further packets of the same message follow.
    pub fn more_to_follow(self) -> bool {
        !self.is_last()
    }
}

/// One EmBER data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmberPacket {
    pub flags: PacketFlags,
    pub dtd: u8,
    pub app_bytes: Vec<u8>,
    pub payload: Bytes,
}

impl EmberPacket {
    /// A Glow packet with the default DTD header.
    pub fn glow(flags: PacketFlags, payload: impl Into<Bytes>) -> Self {
        Self {
            flags,
            dtd: DTD_GLOW,
            app_bytes: GLOW_APP_BYTES.to_vec(),
            payload: payload.into(),
        }
    }
}

/// The command carried by a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ember(EmberPacket),
    KeepAliveRequest,
    KeepAliveResponse,
}

impl Command {
    fn code(&self) -> u8 {
        match self {
            Command::Ember(_) => COMMAND_EMBER,
            Command::KeepAliveRequest => COMMAND_KEEP_ALIVE_REQUEST,
            Command::KeepAliveResponse => COMMAND_KEEP_ALIVE_RESPONSE,
        }
    }
}

/// A decoded S101 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub slot: u8,
    pub command: Command,
}

impl Frame {
    pub fn new(slot: u8, command: Command) -> Self {
        Self { slot, command }
    }

    pub fn keep_alive_request(slot: u8) -> Self {
        Self::new(slot, Command::KeepAliveRequest)
    }

    pub fn keep_alive_response(slot: u8) -> Self {
        Self::new(slot, Command::KeepAliveResponse)
    }
}

/// A complete application-level S101 message, after reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ember { slot: u8, payload: Bytes },
    KeepAliveRequest { slot: u8 },
    KeepAliveResponse { slot: u8 },
}

impl Message {
    pub fn slot(&self) -> u8 {
        match self {
            Message::Ember { slot, .. }
            | Message::KeepAliveRequest { slot }
            | Message::KeepAliveResponse { slot } => *slot,
        }
    }
}

/// Configuration for the S101 codec.
#[derive(Debug, Clone)]
pub struct S101Config {
    /// Largest payload carried by one packet before a message is split. Default: 1024.
    pub max_packet_payload: usize,
    /// Largest escaped frame accepted while searching for the end delimiter. Default: 64 KiB.
    pub max_frame_size: usize,
    /// Largest reassembled message. Default: 16 MiB.
    pub max_message_size: usize,
    /// Consecutive recoverable errors tolerated before the stream is abandoned. Default: 16.
    pub max_consecutive_errors: usize,
}

impl Default for S101Config {
    fn default() -> Self {
        Self {
            max_packet_payload: DEFAULT_MAX_PACKET_PAYLOAD,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// CRC-16/CCITT in reflected form (polynomial 0x8408, initial value 0xFFFF), not complemented.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0x8408
            } else {
                crc >> 1
            };
        }
    }
    crc
}

fn put_escaped(byte: u8, dst: &mut BytesMut) {
    if byte >= INVALID_START {
        dst.put_u8(CE);
        dst.put_u8(byte ^ ESCAPE_XOR);
    } else {
        dst.put_u8(byte);
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// BOF | escaped( slot 0x0E command 0x01 [flags dtd n app-bytes] payload | ~crc16 LE ) | EOF
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let mut raw = BytesMut::with_capacity(HEADER_SIZE + EMBER_HEADER_SIZE + 64);
    raw.put_u8(frame.slot);
    raw.put_u8(MESSAGE_TYPE_EMBER);
    raw.put_u8(frame.command.code());
    raw.put_u8(VERSION);

    if let Command::Ember(packet) = &frame.command {
        let app_len = u8::try_from(packet.app_bytes.len()).map_err(|_| {
            FrameError::FrameTooLarge {
                size: packet.app_bytes.len(),
                max: usize::from(u8::MAX),
            }
        })?;
        raw.put_u8(packet.flags.0);
        raw.put_u8(packet.dtd);
        raw.put_u8(app_len);
        raw.put_slice(&packet.app_bytes);
        raw.put_slice(&packet.payload);
    }

    let crc = !crc16(&raw);
    raw.put_u16_le(crc);

    dst.reserve(raw.len() * 2 + 2);
    dst.put_u8(BOF);
    for &byte in raw.iter() {
        put_escaped(byte, dst);
    }
    dst.put_u8(EOF);
    Ok(())
}

/// Encode a complete EmBER message, splitting it into packets of at most
/// `config.max_packet_payload` bytes.
pub fn encode_message(slot: u8, payload: &[u8], config: &S101Config, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > config.max_message_size {
        return Err(FrameError::MessageTooLarge {
            size: payload.len(),
            max: config.max_message_size,
        });
    }

    let mut count = 0;
    for frame in message_frames(slot, payload, config.max_packet_payload) {
        encode_frame(&frame, dst)?;
        count += 1;
    }

    trace!(slot, size = payload.len(), packets = count, "encoded S101 message");
    Ok(())
}

/// Split a message into the Glow data frames that carry it, at most
/// `packet_payload` bytes each. An empty message travels as one EMPTY packet.
pub fn message_frames(
    slot: u8,
    payload: &[u8],
    packet_payload: usize,
) -> impl Iterator<Item = Frame> + '_ {
    let chunk_size = packet_payload.max(1);
    let count = payload.len().div_ceil(chunk_size).max(1);
    (0..count).map(move |index| {
        let start = index * chunk_size;
        let chunk = &payload[start..payload.len().min(start + chunk_size)];
        let mut flags = 0;
        if index == 0 {
            flags |= PacketFlags::FIRST;
        }
        if index + 1 == count {
            flags |= PacketFlags::LAST;
        }
        if payload.is_empty() {
            flags |= PacketFlags::EMPTY;
        }
        let packet = EmberPacket::glow(PacketFlags(flags), Bytes::copy_from_slice(chunk));
        Frame::new(slot, Command::Ember(packet))
    })
}

/// Encode any [`Message`].
pub fn encode(message: &Message, config: &S101Config, dst: &mut BytesMut) -> Result<()> {
    match message {
        Message::Ember { slot, payload } => encode_message(*slot, payload, config, dst),
        Message::KeepAliveRequest { slot } => encode_frame(&Frame::keep_alive_request(*slot), dst),
        Message::KeepAliveResponse { slot } => {
            encode_frame(&Frame::keep_alive_response(*slot), dst)
        }
    }
}

/// Decode the next frame from a buffer.
///
/// Bytes before the first start delimiter are discarded. Returns `Ok(None)` if
/// the buffer doesn't contain a complete frame yet. On a recoverable error the
/// offending bytes have already been consumed, so calling again resumes at the
/// next start delimiter.
pub fn decode_frame(src: &mut BytesMut, config: &S101Config) -> Result<Option<Frame>> {
    match src.iter().position(|&b| b == BOF) {
        Some(0) => {}
        Some(start) => {
            trace!(discarded = start, "skipping bytes before start delimiter");
            src.advance(start);
        }
        None => {
            if !src.is_empty() {
                trace!(discarded = src.len(), "skipping bytes without start delimiter");
                src.clear();
            }
            return Ok(None);
        }
    }

    let boundary = src[1..]
        .iter()
        .position(|&b| b == EOF || b == BOF)
        .map(|index| index + 1);

    let end = match boundary {
        Some(index) if src[index] == BOF => {
            src.advance(index);
            return Err(FrameError::UnbalancedDelimiter);
        }
        Some(index) => index,
        None => {
            if src.len() > config.max_frame_size {
                let size = src.len();
                src.clear();
                return Err(FrameError::FrameTooLarge {
                    size,
                    max: config.max_frame_size,
                });
            }
            return Ok(None);
        }
    };

    let escaped = src.split_to(end + 1);
    let raw = unescape(&escaped[1..end])?;
    parse_frame(raw).map(Some)
}

fn unescape(escaped: &[u8]) -> Result<BytesMut> {
    let mut raw = BytesMut::with_capacity(escaped.len());
    let mut bytes = escaped.iter();
    while let Some(&byte) = bytes.next() {
        match byte {
            CE => match bytes.next() {
                Some(&next) if next < INVALID_START => raw.put_u8(next ^ ESCAPE_XOR),
                _ => return Err(FrameError::InvalidEscape),
            },
            b if b >= INVALID_START => return Err(FrameError::InvalidEscape),
            b => raw.put_u8(b),
        }
    }
    Ok(raw)
}

fn parse_frame(mut raw: BytesMut) -> Result<Frame> {
    if raw.len() < HEADER_SIZE + CRC_SIZE {
        return Err(FrameError::Truncated("header"));
    }

    let body_len = raw.len() - CRC_SIZE;
    let actual = u16::from_le_bytes([raw[body_len], raw[body_len + 1]]);
    let expected = !crc16(&raw[..body_len]);
    if actual != expected {
        return Err(FrameError::InvalidChecksum { expected, actual });
    }
    raw.truncate(body_len);

    let slot = raw.get_u8();
    let message_type = raw.get_u8();
    let command = raw.get_u8();
    let version = raw.get_u8();

    if message_type != MESSAGE_TYPE_EMBER {
        return Err(FrameError::UnsupportedMessageType(message_type));
    }
    if version != VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let command = match command {
        COMMAND_EMBER => {
            if raw.len() < EMBER_HEADER_SIZE {
                return Err(FrameError::Truncated("ember header"));
            }
            let flags = PacketFlags(raw.get_u8());
            let dtd = raw.get_u8();
            let app_len = usize::from(raw.get_u8());
            if raw.len() < app_len {
                return Err(FrameError::Truncated("application bytes"));
            }
            let app_bytes = raw.split_to(app_len).to_vec();
            Command::Ember(EmberPacket {
                flags,
                dtd,
                app_bytes,
                payload: raw.freeze(),
            })
        }
        COMMAND_KEEP_ALIVE_REQUEST => Command::KeepAliveRequest,
        COMMAND_KEEP_ALIVE_RESPONSE => Command::KeepAliveResponse,
        other => return Err(FrameError::UnsupportedCommand(other)),
    };

    trace!(slot, ?command, "decoded S101 frame");
    Ok(Frame { slot, command })
}
