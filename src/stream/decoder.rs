//! Newline framing for the streaming response body

/// Splits arbitrarily-chunked bytes into complete newline-terminated records.
///
/// Bytes after the last `\n` of a chunk are held back and prepended to the
/// next one. Framing works on bytes, so a multi-byte UTF-8 sequence split
/// across chunks is reassembled before any text conversion happens.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every record it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut records = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.pending.is_empty() {
                records.push(decode_line(line));
            } else {
                self.pending.extend_from_slice(line);
                let joined = std::mem::take(&mut self.pending);
                records.push(decode_line(&joined));
            }
        }

        self.pending.extend_from_slice(rest);
        records
    }

    /// Number of buffered bytes still waiting for a delimiter
    #[allow(dead_code)] // Useful for tests
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// End of transport. Any unterminated tail is dropped; returns its length.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "Discarding unterminated record at end of stream");
        }
        self.pending.clear();
        dropped
    }
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
