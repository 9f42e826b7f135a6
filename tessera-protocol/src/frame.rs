//! Newline-delimited framing.
//!
//! Every request is one line of JSON text terminated by `\n`; a subscription
//! reply is a sequence of such lines. There is no length prefix, so the
//! receiver buffers bytes until a delimiter arrives.

use crate::error::ProtocolError;
use crate::{FRAME_DELIMITER, MAX_FRAME_SIZE};
use bytes::{Bytes, BytesMut};

/// Appends the frame delimiter to wire text.
pub fn encode_frame(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(&[FRAME_DELIMITER]);
    buf.freeze()
}

/// Accumulates received bytes and splits them into lines.
pub struct LineDecoder {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no delimiter.
    scanned: usize,
    max_frame_size: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            max_frame_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete line without its delimiter.
    ///
    /// Blank lines are skipped. Returns `Ok(None)` when no delimiter is
    /// buffered yet, and an error once an unterminated line outgrows the
    /// frame size limit.
    pub fn next_line(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == FRAME_DELIMITER)
                .map(|offset| self.scanned + offset);
            let Some(pos) = found else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_frame_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: self.buffer.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            };

            self.scanned = 0;
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.len() > self.max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: line.len(),
                    max: self.max_frame_size,
                });
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line.freeze()));
        }
    }

    /// Drains whatever is buffered after the last delimiter.
    ///
    /// Used at end-of-stream, where an unterminated reply may still be whole.
    pub fn take_remainder(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        let rest = self.buffer.split().freeze();
        if rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(rest)
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
