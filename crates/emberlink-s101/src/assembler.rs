use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::PacketFlags;
use crate::error::{FrameError, Result};

#[derive(Debug)]
struct Pending {
    slot: u8,
    buf: BytesMut,
}

/// Concatenates the packets of multi-packet EmBER messages.
#[derive(Debug)]
pub struct MessageAssembler {
    pending: Option<Pending>,
    max_message_size: usize,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            pending: None,
            max_message_size,
        }
    }

    /// Returns true while a message is partially assembled.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any partially assembled message.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Add one packet, returning the complete message once its last packet arrives.
    ///
    /// A first packet arriving while another message is still incomplete
    /// discards the partial message and returns
    /// [`FrameError::IncompleteMessage`] *without* consuming the packet: the
    /// assembler is then empty and the caller pushes the same packet again.
    /// Every other error consumes the packet.
    pub fn push(&mut self, slot: u8, flags: PacketFlags, payload: &[u8]) -> Result<Option<Bytes>> {
        let payload = if flags.is_empty() { &[][..] } else { payload };

        if flags.is_first() {
            if let Some(partial) = self.pending.take() {
                return Err(FrameError::IncompleteMessage {
                    discarded: partial.buf.len(),
                });
            }
            self.check_size(0, payload.len())?;
            if flags.is_last() {
                return Ok(Some(Bytes::copy_from_slice(payload)));
            }
            trace!(slot, size = payload.len(), "first packet of multi-packet message");
            self.pending = Some(Pending {
                slot,
                buf: BytesMut::from(payload),
            });
            return Ok(None);
        }

        let Some(mut partial) = self.pending.take() else {
            return Err(FrameError::UnexpectedContinuation);
        };
        if partial.slot != slot {
            return Err(FrameError::SlotMismatch {
                expected: partial.slot,
                actual: slot,
            });
        }
        self.check_size(partial.buf.len(), payload.len())?;
        partial.buf.extend_from_slice(payload);

        if flags.is_last() {
            trace!(slot, size = partial.buf.len(), "message reassembled");
            return Ok(Some(partial.buf.freeze()));
        }
        self.pending = Some(partial);
        Ok(None)
    }

    fn check_size(&self, current: usize, additional: usize) -> Result<()> {
        let size = current + additional;
        if size > self.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }
}
