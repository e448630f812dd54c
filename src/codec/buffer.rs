//! Reassembly of messages from a byte stream.

use super::binary::declared_frame_len;
use super::error::DecodeError;
use super::message::Message;

/// Accumulates stream bytes and yields whole messages.
///
/// Transports that preserve message boundaries never need this; stream
/// transports push whatever arrived and drain with [`FrameBuffer::next_message`].
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    /// Bytes of a corrupt frame that have not arrived yet.
    skip: usize,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        let skipped = self.skip.min(data.len());
        self.skip -= skipped;
        self.buf.extend_from_slice(&data[skipped..]);
    }

    /// Pop the next complete message.
    ///
    /// Returns `Ok(None)` while more bytes are needed. On a protocol error the
    /// offending frame is skipped when its length is known, including bytes
    /// of it that have not been pushed yet. Otherwise the whole buffer is
    /// discarded, so the next call starts clean.
    pub fn next_message(&mut self) -> Result<Option<Message>, DecodeError> {
        match super::decode_with_length(&self.buf) {
            Ok((message, used)) => {
                self.buf.drain(..used);
                Ok(Some(message))
            }
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => {
                match declared_frame_len(&self.buf) {
                    Some(len) if len <= self.buf.len() => {
                        self.buf.drain(..len);
                    }
                    Some(len) => {
                        self.skip = len - self.buf.len();
                        self.buf.clear();
                    }
                    None => self.buf.clear(),
                }
                Err(e)
            }
        }
    }

    /// Buffered byte count.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop buffered bytes and forget any pending skip.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.skip = 0;
    }
}
