//! Byte-level plumbing for the feedback stream: stateful UTF-8 decoding
//! of raw transport chunks and splitting of the decoded text into
//! complete protocol lines.

use anyhow::{anyhow, Result};
use std::str;
use tracing::{debug, warn};

/// Decodes raw byte chunks into text, carrying incomplete multi-byte
/// sequences over to the next chunk.
///
/// A UTF-8 character split across two transport chunks decodes
/// correctly once both halves have arrived.
#[derive(Default)]
pub struct Utf8ChunkDecoder {
    residue: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.residue.extend_from_slice(chunk);

        match str::from_utf8(&self.residue) {
            Ok(text) => {
                let text = text.to_owned();
                self.residue.clear();
                Ok(text)
            }
            Err(e) => {
                if e.error_len().is_some() {
                    // Invalid sequence in the middle of the data, not a
                    // chunk-boundary artifact
                    return Err(anyhow!("invalid UTF-8 in stream: {e}"));
                }
                let valid_up_to = e.valid_up_to();
                let text = str::from_utf8(&self.residue[..valid_up_to])?.to_owned();
                self.residue.drain(..valid_up_to);
                Ok(text)
            }
        }
    }

    /// Signal end-of-stream. Bytes that can no longer form a complete
    /// character are dropped with a diagnostic; the payload is expected
    /// to be ASCII-safe JSON, so this is not fatal.
    pub fn finish(&mut self) {
        if !self.residue.is_empty() {
            warn!(
                bytes = self.residue.len(),
                "dropping incomplete UTF-8 sequence at end of stream"
            );
            self.residue.clear();
        }
    }
}

/// Splits decoded text into complete lines, retaining the trailing
/// partial line until its delimiter arrives.
///
/// Blank lines are frame separators and are discarded. A line is only
/// handed out once a `\n` has been observed after it.
#[derive(Default)]
pub struct FrameSplitter {
    partial: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and return all newly completed lines.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for c in text.chars() {
            if c == '\n' {
                let line = std::mem::take(&mut self.partial);
                if !line.trim().is_empty() {
                    lines.push(line);
                }
            } else {
                self.partial.push(c);
            }
        }
        lines
    }

    /// Signal end-of-stream. A trailing fragment without its delimiter
    /// is never classified; the sender terminates every frame, so an
    /// unterminated remainder is discarded with a diagnostic.
    pub fn finish(&mut self) {
        if !self.partial.trim().is_empty() {
            debug!(
                fragment_len = self.partial.len(),
                "discarding unterminated trailing fragment"
            );
        }
        self.partial.clear();
    }
}
