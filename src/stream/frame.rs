//! Line-oriented frame decoder for `data: {json}` streams.

use serde_json::Value;

/// Prefix carried by every frame line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that marks the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The `content` member, when it is a string.
    pub content: Option<String>,
}

/// Incremental decoder.
///
/// Chunk boundaries are arbitrary: a frame (or a single UTF-8 character)
/// may be split across any number of chunks. Bytes after the last newline
/// stay buffered until the next chunk or [`FrameDecoder::finish`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        self.feed_bytes(chunk.as_bytes())
    }

    /// Decode every complete line now available.
    ///
    /// Once `[DONE]` has been seen, later chunks are ignored without being
    /// buffered.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let line_end = consumed + offset;
            let line = String::from_utf8_lossy(&self.pending[consumed..line_end]).into_owned();
            consumed = line_end + 1;

            match decode_line(&line) {
                Line::Skip => {}
                Line::Done => {
                    self.done = true;
                    break;
                }
                Line::Frame(frame) => frames.push(frame),
            }
        }
        self.pending.drain(..consumed);
        frames
    }

    /// Decode a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        match decode_line(&line) {
            Line::Frame(frame) => vec![frame],
            Line::Done => {
                self.done = true;
                Vec::new()
            }
            Line::Skip => Vec::new(),
        }
    }
}

enum Line {
    Skip,
    Done,
    Frame(Frame),
}

fn decode_line(line: &str) -> Line {
    let line = line.trim();
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim();
    if payload.is_empty() {
        return Line::Skip;
    }
    if payload == DONE_SENTINEL {
        return Line::Done;
    }
    // Malformed frames are dropped.
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => Line::Frame(Frame {
            content: value
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        Err(_) => Line::Skip,
    }
}
