use bytes::BytesMut;
use tracing::warn;

use crate::assembler::MessageAssembler;
use crate::codec::{decode_frame, Command, Frame, Message, S101Config};
use crate::error::{FrameError, Result};

/// Turns buffered bytes into complete [`Message`]s.
#[derive(Debug)]
pub struct MessageDecoder {
    config: S101Config,
    assembler: MessageAssembler,
    deferred: Option<Frame>,
    consecutive_errors: usize,
}

impl MessageDecoder {
    pub fn new(config: S101Config) -> Self {
        Self {
            assembler: MessageAssembler::new(config.max_message_size),
            config,
            deferred: None,
            consecutive_errors: 0,
        }
    }

    /// Decode the next message, surfacing every framing error.
    ///
    /// Returns `Ok(None)` if `src` does not yet hold a complete message. After a
    /// recoverable error the decoder stays usable; call again to continue.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        loop {
            let frame = match self.deferred.take() {
                Some(frame) => frame,
                None => match decode_frame(src, &self.config)? {
                    Some(frame) => frame,
                    None => return Ok(None),
                },
            };

            let slot = frame.slot;
            let packet = match frame.command {
                Command::KeepAliveRequest => return Ok(Some(Message::KeepAliveRequest { slot })),
                Command::KeepAliveResponse => {
                    return Ok(Some(Message::KeepAliveResponse { slot }))
                }
                Command::Ember(packet) => packet,
            };

            match self.assembler.push(slot, packet.flags, &packet.payload) {
                Ok(Some(payload)) => return Ok(Some(Message::Ember { slot, payload })),
                Ok(None) => continue,
                Err(err @ FrameError::IncompleteMessage { .. }) => {
                    self.deferred = Some(Frame::new(slot, Command::Ember(packet)));
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Decode the next message, logging and skipping recoverable errors.
    ///
    /// Fails with [`FrameError::TooManyErrors`] once more than
    /// `max_consecutive_errors` recoverable errors occur without a message in between.
    pub fn decode_recovering(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        loop {
            match self.decode(src) {
                Ok(Some(message)) => {
                    self.consecutive_errors = 0;
                    return Ok(Some(message));
                }
                Ok(None) => return Ok(None),
                Err(err) if err.is_recoverable() => {
                    self.consecutive_errors += 1;
                    warn!(
                        error = %err,
                        consecutive = self.consecutive_errors,
                        "dropping S101 frame"
                    );
                    if self.consecutive_errors > self.config.max_consecutive_errors {
                        return Err(FrameError::TooManyErrors {
                            count: self.consecutive_errors,
                        });
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Drop buffered partial state, e.g. at end of stream.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.deferred = None;
    }
}
