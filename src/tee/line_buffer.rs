//! Incomplete-line accumulator
//!
//! Bytes are buffered until a newline arrives. Keeping raw bytes (instead of
//! text) means a multi-byte UTF-8 character split across two writes is
//! reassembled before it is decoded.

/// Buffer holding everything written since the last emitted line
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` to whatever is pending
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Remove and return the first complete line
    ///
    /// The newline is dropped; every other byte of the line, including a
    /// trailing `\r`, is kept. Lines after it stay pending until asked for.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.pending[..newline]).into_owned();
        self.pending.drain(..=newline);
        Some(line)
    }

    /// The unterminated remainder, left in place
    pub fn remainder(&self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.pending).into_owned())
    }

    /// Discard everything pending
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Bytes currently waiting to be emitted
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
