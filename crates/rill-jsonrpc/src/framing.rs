//! Delimiter framing for stream transports.
//!
//! A single network read may contain zero, one, a fraction of, or many
//! logical messages. [`FrameBuffer`] accumulates the bytes and hands back
//! complete frames; the trailing fragment stays buffered for the next
//! read.

use bytes::BytesMut;

/// Byte accumulator splitting on a configured delimiter.
///
/// Invariant: after [`FrameBuffer::extract`] the buffer holds at most one
/// trailing partial frame (no delimiter). No bytes are lost: extracted
/// frames plus the residual reconstruct the input, modulo delimiters.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    delimiter: Vec<u8>,
}

impl FrameBuffer {
    /// Create a buffer splitting on `delimiter`. The delimiter must not
    /// be empty.
    pub fn new(delimiter: impl AsRef<[u8]>) -> Self {
        let delimiter = delimiter.as_ref().to_vec();
        assert!(!delimiter.is_empty(), "frame delimiter must not be empty");
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            delimiter,
        }
    }

    /// Append a chunk. Leading whitespace is trimmed when the buffer is
    /// empty, tolerating stray inter-message padding; mid-frame chunks
    /// are appended verbatim so arbitrary read partitions reassemble.
    pub fn push(&mut self, chunk: &[u8]) {
        let chunk = if self.buffer.is_empty() {
            let start = chunk
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(chunk.len());
            &chunk[start..]
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);
    }

    /// Split off every complete frame. Whitespace-only frames are
    /// discarded; the trailing fragment stays buffered.
    pub fn extract(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(pos) = find(&self.buffer, &self.delimiter) {
            let segment = self.buffer.split_to(pos + self.delimiter.len());
            let content = String::from_utf8_lossy(&segment[..pos]);
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                frames.push(trimmed.to_string());
            }
        }
        frames
    }

    /// Push a chunk and extract in one step.
    pub fn drain(&mut self, chunk: &[u8]) -> Vec<String> {
        self.push(chunk);
        self.extract()
    }

    /// Bytes currently buffered (the unfinished trailing frame).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new("\n")
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"{\"a\":1}\n");
        assert_eq!(frames, vec!["{\"a\":1}"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"one\ntwo\nthree\n");
        assert_eq!(frames, vec!["one", "two", "three"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_frame_retained() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"complete\npart");
        assert_eq!(frames, vec!["complete"]);
        assert_eq!(buffer.len(), 4);

        let frames = buffer.drain(b"ial\n");
        assert_eq!(frames, vec!["partial"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_segments_discarded() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"a\n\n\nb\n");
        assert_eq!(frames, vec!["a", "b"]);
    }

    #[test]
    fn test_leading_padding_trimmed() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"  \n  {\"a\":1}\n");
        assert_eq!(frames, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_whitespace_only_segment_discarded() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.drain(b"a\n   \nb\n");
        assert_eq!(frames, vec!["a", "b"]);
    }

    #[test]
    fn test_custom_multibyte_delimiter() {
        let mut buffer = FrameBuffer::new("\r\n");
        let frames = buffer.drain(b"one\r\ntwo\r\nthr");
        assert_eq!(frames, vec!["one", "two"]);
        let frames = buffer.drain(b"ee\r\n");
        assert_eq!(frames, vec!["three"]);
    }

    #[test]
    fn test_delimiter_split_across_pushes() {
        let mut buffer = FrameBuffer::new("\r\n");
        assert!(buffer.drain(b"frame\r").is_empty());
        assert_eq!(buffer.drain(b"\n"), vec!["frame"]);
    }

    // Property: any byte partitioning of a delimited stream yields the
    // same frames as the unpartitioned input.
    #[test]
    fn test_byte_at_a_time() {
        let input = b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n";

        let mut whole = FrameBuffer::default();
        let expected = whole.drain(input);

        let mut buffer = FrameBuffer::default();
        let mut collected = Vec::new();
        for byte in input {
            collected.extend(buffer.drain(&[*byte]));
        }
        assert_eq!(collected, expected);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_all_partitions_of_small_stream() {
        let input = b"ab\ncd\n";
        let mut whole = FrameBuffer::default();
        let expected = whole.drain(input);

        for split in 0..=input.len() {
            let mut buffer = FrameBuffer::default();
            let mut collected = buffer.drain(&input[..split]);
            collected.extend(buffer.drain(&input[split..]));
            assert_eq!(collected, expected, "split at {}", split);
        }
    }
}
