//! S101 framing for EmBER messages.
//!
//! Every message travels in one or more frames:
//! - `0xFE` start and `0xFF` end delimiters, with bytes `>= 0xF8` escaped as `0xFD, b ^ 0x20`
//! - a header naming the slot, message type, command and version
//! - packet flags chaining the frames of one multi-packet message
//! - a trailing CRC-16/CCITT
//!
//! Callers see complete, reassembled messages. Corrupt frames are dropped and
//! decoding resumes at the next start delimiter.

pub mod assembler;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use assembler::MessageAssembler;
pub use codec::{
    crc16, decode_frame, encode, encode_frame, encode_message, message_frames, Command,
    EmberPacket, Frame, Message, PacketFlags, S101Config, DEFAULT_MAX_PACKET_PAYLOAD,
};
pub use decoder::MessageDecoder;
pub use error::{FrameError, Result};
pub use reader::S101Reader;
pub use writer::S101Writer;

#[cfg(feature = "async")]
pub use async_codec::S101Codec;
