//! Stateful UTF-8 decoding for chunked response bodies
//!
//! A network chunk can end in the middle of a multi-byte character, so the
//! trailing incomplete sequence is held back and prefixed to the next chunk.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid UTF-8 sequence in response stream")]
    InvalidSequence,
    #[error("response stream ended inside a UTF-8 sequence")]
    Truncated,
}

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    // At most 3 bytes: the longest incomplete prefix of a 4-byte character
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        match std::str::from_utf8(&buf) {
            Ok(text) => Ok(text.to_string()),
            Err(e) => {
                if e.error_len().is_some() {
                    return Err(DecodeError::InvalidSequence);
                }
                let valid = e.valid_up_to();
                self.pending = buf.split_off(valid);
                // `buf[..valid]` was just validated by from_utf8
                String::from_utf8(buf).map_err(|_| DecodeError::InvalidSequence)
            }
        }
    }

    /// Signal end of stream; fails if a partial character is still buffered.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.has_pending() {
            Err(DecodeError::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
