//! Newline-delimited framing.
//!
//! # Panic-Free Guarantees
//!
//! Buffer handling uses `position()` and `drain()` only; there is no
//! direct indexing.

use thiserror::Error;

use crate::reply::Reply;

/// Longest unterminated line the codec will hold (1 MiB).
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Framing and encoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("line exceeds {max} bytes without a terminator ({size} pending)")]
    LineTooLong { size: usize, max: usize },

    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Splits an inbound byte stream into text lines.
///
/// The result is independent of how the stream was chunked: feeding
/// `"PI"` then `"NG\n"` yields the same `["PING"]` as feeding `"PING\n"`.
#[derive(Debug)]
pub struct LineCodec {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Appends a chunk and returns every line it completed.
    ///
    /// Lines are trimmed of trailing whitespace (including `\r`), blank
    /// lines are dropped, and invalid UTF-8 is replaced lossily.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, CodecError> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(raw.strip_suffix(b"\n").unwrap_or(&raw));
            let line = text.trim_end();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        if self.buffer.len() > self.max_line {
            return Err(CodecError::LineTooLong {
                size: self.buffer.len(),
                max: self.max_line,
            });
        }

        Ok(lines)
    }

    /// Encodes a reply as exactly one `\n`-terminated line.
    pub fn encode(reply: &Reply) -> Result<Vec<u8>, CodecError> {
        let mut line = reply.to_line()?;
        line.push('\n');
        Ok(line.into_bytes())
    }
}
