//! Incremental line framing for SSE response bodies
//!
//! Chunks arrive at arbitrary boundaries. The assembler buffers raw bytes and
//! only decodes a line once its terminating `\n` has arrived, so a multi-byte
//! UTF-8 sequence split across two chunks is never mangled.

/// SSE field prefix carrying the event payload
pub const DATA_PREFIX: &str = "data:";

/// Byte-level line assembler owning the partial tail of one connection
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate the complete lines now available.
    ///
    /// Lines are produced lazily; any not consumed before the iterator is
    /// dropped stay buffered and come out of the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> CompleteLines<'_> {
        self.buffer.extend_from_slice(chunk);
        CompleteLines {
            assembler: self,
            consumed: 0,
        }
    }

    /// Bytes held for an incomplete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: drop the unterminated tail, returning its length.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        discarded
    }
}

/// Iterator over the complete lines of a `FrameAssembler`
pub struct CompleteLines<'a> {
    assembler: &'a mut FrameAssembler,
    consumed: usize,
}

impl Iterator for CompleteLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.assembler.buffer[self.consumed..];
        let newline = rest.iter().position(|b| *b == b'\n')?;
        let line = String::from_utf8_lossy(&rest[..newline]).into_owned();
        self.consumed += newline + 1;
        Some(line)
    }
}

impl Drop for CompleteLines<'_> {
    fn drop(&mut self) {
        self.assembler.buffer.drain(..self.consumed);
    }
}

/// Payload of a `data:` line, or `None` for other SSE fields and blank lines.
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim().strip_prefix(DATA_PREFIX)
}
