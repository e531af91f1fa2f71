/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// Bytes are buffered until a `\n` arrives, so a line (or a multi-byte
/// character) cut in half by a chunk boundary comes out whole. Blank lines
/// are dropped.
#[derive(Debug, Clone, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|byte| *byte == b'\n') {
            let end = start + offset;
            if let Some(line) = decode_line(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end_matches('\r');
    if trimmed.trim().is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::LineFramer;

    #[test]
    fn splits_complete_lines_and_skips_blanks() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"{\"a\":1}\n\n{\"b\":2}\r\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(framer.pending_len(), 0);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn joins_lines_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"{\"event\":\"st").is_empty());
        assert!(framer.push(b"ep\",\"step\"").is_empty());
        assert_eq!(framer.push(b":3}\n{\"ev"), vec!["{\"event\":\"step\",\"step\":3}"]);
        assert_eq!(framer.finish().as_deref(), Some("{\"ev"));
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let line = "{\"prompt\":\"一只猫\"}\n".as_bytes();
        let mut framer = LineFramer::new();
        let (head, tail) = line.split_at(13);
        assert!(framer.push(head).is_empty());
        assert_eq!(framer.push(tail), vec!["{\"prompt\":\"一只猫\"}"]);
    }
}
