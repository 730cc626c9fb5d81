//! Byte-stream framing for the module's serial protocol.
//!
//! Frames are delimited by `#` (start) and `\n` (end). The parser buffers
//! partial data across reads, so it can be fed arbitrary chunk boundaries
//! straight from the UART. A `#` while bytes are pending discards them;
//! the module's boot loader emits trains of `C` characters which are
//! silently swallowed, anything else is logged.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::message::FanetMessage;

/// Start-of-frame delimiter.
pub const START_DELIMITER: u8 = b'#';
/// End-of-frame delimiter.
pub const END_DELIMITER: u8 = b'\n';

/// Splits a byte stream into frames and decodes them into
/// [`FanetMessage`]s.
///
/// ```
/// use fanet_models::{FanetMessage, FrameParser};
///
/// let mut parser = FrameParser::new();
/// parser.feed(b"#DGR OK\n");
/// assert!(matches!(parser.next(), Some(FanetMessage::RegionReply(_))));
/// assert!(parser.next().is_none());
/// ```
#[derive(Debug, Default)]
pub struct FrameParser {
    pending: VecDeque<u8>,
    buf: Vec<u8>,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn feed(&mut self, data: &[u8]) {
        self.pending.extend(data);
    }

    /// Extract the next complete frame body (the bytes between the
    /// delimiters), or `None` when more input is needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        while let Some(byte) = self.pending.pop_front() {
            match byte {
                START_DELIMITER => {
                    // boot-loader training sequences (CCC...) are expected
                    if !self.buf.is_empty() && !self.buf.iter().all(|&b| b == b'C') {
                        warn!(
                            discarded = %String::from_utf8_lossy(&self.buf),
                            "discarding incomplete message"
                        );
                    }
                    self.buf.clear();
                }
                END_DELIMITER => return Some(std::mem::take(&mut self.buf)),
                other => self.buf.push(other),
            }
        }
        None
    }

    /// Decode the next typed message, skipping frames with unknown tags.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<FanetMessage> {
        while let Some(frame) = self.next_frame() {
            debug!(frame = %String::from_utf8_lossy(&frame), "frame received");
            if let Some(message) = FanetMessage::parse(&frame) {
                return Some(message);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReplyKind;

    #[test]
    fn boot_noise_then_two_frames() {
        let mut parser = FrameParser::new();
        parser.feed(b"CCC#FNR OK\n#DGV build-202201131742\n");

        let Some(FanetMessage::TransmitReply(reply)) = parser.next() else {
            panic!("expected FNR reply");
        };
        assert_eq!(reply.reply().kind(), ReplyKind::Ok);

        let Some(FanetMessage::VersionReply(version)) = parser.next() else {
            panic!("expected version reply");
        };
        assert_eq!(version.version(), Some("202201131742"));

        assert!(parser.next().is_none());
    }

    #[test]
    fn frames_survive_arbitrary_chunking() {
        let stream = b"#DGR OK\n#FNR MSG,1,initialized\n";
        for split in 1..stream.len() {
            let mut parser = FrameParser::new();
            parser.feed(&stream[..split]);
            let mut messages = Vec::new();
            while let Some(msg) = parser.next() {
                messages.push(msg);
            }
            parser.feed(&stream[split..]);
            while let Some(msg) = parser.next() {
                messages.push(msg);
            }
            assert_eq!(messages.len(), 2, "split at {split}");
        }
    }

    #[test]
    fn start_delimiter_discards_partial_frame() {
        let mut parser = FrameParser::new();
        parser.feed(b"#DGR garbled#DGR OK\n");
        let Some(FanetMessage::RegionReply(reply)) = parser.next() else {
            panic!("expected region reply");
        };
        assert_eq!(reply.kind(), ReplyKind::Ok);
        assert!(parser.next().is_none());
    }

    #[test]
    fn incomplete_frame_stays_buffered() {
        let mut parser = FrameParser::new();
        parser.feed(b"#DGR O");
        assert!(parser.next_frame().is_none());
        parser.feed(b"K\n");
        assert_eq!(parser.next_frame().as_deref(), Some(&b"DGR OK"[..]));
    }

    #[test]
    fn yielded_frames_match_delimited_subsequences() {
        let mut parser = FrameParser::new();
        parser.feed(b"junk#one\n#two\nmore#three\n");
        let mut frames = Vec::new();
        while let Some(frame) = parser.next_frame() {
            frames.push(frame);
        }
        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn unknown_tags_are_skipped_not_fatal() {
        let mut parser = FrameParser::new();
        parser.feed(b"#XYZ whatever\n#DGR OK\n");
        assert!(matches!(parser.next(), Some(FanetMessage::RegionReply(_))));
    }

    #[test]
    fn carriage_returns_are_tolerated() {
        let mut parser = FrameParser::new();
        parser.feed(b"#DGV build-202201131742\r\n");
        let Some(FanetMessage::VersionReply(version)) = parser.next() else {
            panic!("expected version reply");
        };
        assert_eq!(version.version(), Some("202201131742"));
    }
}
