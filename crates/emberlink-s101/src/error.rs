/// Errors that can occur during S101 frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The trailing CRC does not match the frame contents.
    #[error("frame checksum mismatch (expected {expected:#06x}, found {actual:#06x})")]
    InvalidChecksum { expected: u16, actual: u16 },

    /// An escape marker is dangling or a reserved byte appears unescaped.
    #[error("malformed escape sequence")]
    InvalidEscape,

    /// A start delimiter appeared before the previous frame was terminated.
    #[error("start delimiter inside an unterminated frame")]
    UnbalancedDelimiter,

    /// No end delimiter within the configured frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A reassembled message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The frame is too short to hold its header and checksum.
    #[error("frame truncated: {0}")]
    Truncated(&'static str),

    #[error("unsupported message type {0:#04x}")]
    UnsupportedMessageType(u8),

    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("unsupported protocol version {0:#04x}")]
    UnsupportedVersion(u8),

    /// A continuation packet arrived with no message in progress.
    #[error("continuation packet without a first packet")]
    UnexpectedContinuation,

    /// A new message started before the previous one was completed.
    #[error("incomplete message discarded ({discarded} bytes)")]
    IncompleteMessage { discarded: usize },

    /// A continuation packet belongs to a different slot than the message in progress.
    #[error("continuation on slot {actual}, message in progress on slot {expected}")]
    SlotMismatch { expected: u8, actual: u8 },

    /// Too many frames in a row failed to decode.
    #[error("{count} consecutive framing errors")]
    TooManyErrors { count: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Returns true if the error only affects the current frame or message.
    ///
    /// Decoding can resume at the next start delimiter after a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FrameError::TooManyErrors { .. } | FrameError::Io(_) | FrameError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
