//! UTF-8 reassembly for streamed output

/// Turns a byte stream into text chunks without splitting code points
///
/// Bytes of an incomplete trailing sequence are held back until the next
/// push. Invalid sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the text that is complete so far
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // error_len() is None when the input merely ends mid-sequence
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };

        if complete == 0 {
            return None;
        }

        let rest = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        Some(text)
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut chunker = Utf8Chunker::new();
        assert_eq!(chunker.push(b"hello\n").as_deref(), Some("hello\n"));
        assert!(chunker.finish().is_none());
    }

    #[test]
    fn test_split_code_point_is_held_back() {
        let bytes = "é".as_bytes();
        let mut chunker = Utf8Chunker::new();

        assert_eq!(chunker.push(&[b'a', bytes[0]]).as_deref(), Some("a"));
        assert_eq!(chunker.push(&bytes[1..]).as_deref(), Some("é"));
    }

    #[test]
    fn test_truncated_tail_flushed_lossy() {
        let mut chunker = Utf8Chunker::new();
        assert!(chunker.push(&[0xE2, 0x82]).is_none());
        assert_eq!(chunker.finish().as_deref(), Some("\u{FFFD}"));
    }
}
