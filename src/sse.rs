//! Server-Sent Events (SSE) stream processing utilities.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! [`FrameDecoder`] is transport-agnostic: it accepts arbitrary byte chunks,
//! keeps incomplete lines buffered across chunk boundaries and yields a
//! [`Frame`] for every complete `data:` line.

use bytes::{Buf, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;

/// Record marker preceding every payload.
pub const DATA_MARKER: &str = "data:";

/// Payload of the terminal record.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw payload following a `data:` marker. Not yet parsed.
    Data(String),
    /// The `[DONE]` sentinel, or end of input.
    Done,
}

/// Incremental decoder from bytes to frames.
///
/// Once [`Frame::Done`] has been produced the decoder ignores further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk and collect every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            self.decode_line(&line[..pos], &mut frames);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        frames
    }

    /// Signal end of input: flush the trailing partial record and terminate.
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }
        let mut frames = Vec::new();
        if self.buffer.has_remaining() {
            let rest = self.buffer.split();
            self.decode_line(&rest, &mut frames);
        }
        if !self.done {
            self.done = true;
            frames.push(Frame::Done);
        }
        frames
    }

    /// Only the leading marker is stripped; the payload may itself contain
    /// `data:`. Lines without the marker (comments, `event:`) are ignored.
    fn decode_line(&mut self, line: &[u8], frames: &mut Vec<Frame>) {
        let line = String::from_utf8_lossy(line);
        let Some(payload) = parse_sse_line(&line) else {
            return;
        };
        if payload.is_empty() {
            return;
        }
        if is_done_marker(payload) {
            self.done = true;
            frames.push(Frame::Done);
        } else {
            frames.push(Frame::Data(payload.to_string()));
        }
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use recipai::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_MARKER).map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use recipai::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data.trim() == DONE_SENTINEL
}

/// Extension trait for `reqwest::Response` to enable SSE streaming.
pub trait SSEResponseExt {
    /// Convert the response into a stream of frames.
    ///
    /// The stream always ends with exactly one [`Frame::Done`] unless the
    /// transport fails first, in which case the error is the last item.
    fn sse(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send {
        frames(self.bytes_stream())
    }
}

/// Decode any byte stream into frames.
pub fn frames<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<Frame, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    stream::unfold(
        (Box::pin(byte_stream), FrameDecoder::new(), false),
        |(mut byte_stream, mut decoder, failed)| async move {
            if failed || decoder.is_done() {
                return None;
            }
            let decoded = match byte_stream.next().await {
                Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    let items = vec![Err(e.into())];
                    return Some((stream::iter(items), (byte_stream, decoder, true)));
                }
                None => decoder.finish(),
            };
            let items: Vec<Result<Frame, ClientError>> = decoded.into_iter().map(Ok).collect();
            Some((stream::iter(items), (byte_stream, decoder, false)))
        },
    )
    .flatten()
}
