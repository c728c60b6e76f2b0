//! Incremental decoder for the relay's event-stream body.
//!
//! [`StreamDecoder`] is a synchronous push parser: feed it byte chunks of any
//! size and it returns the frames completed so far. [`decode_stream`] wraps it
//! around an async byte stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use chatrelay_protocol::{DATA_FIELD, StreamFrame};

/// Reading the body failed before the stream ended.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("stream read failed: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Push parser for `data:` records.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Raw bytes of the current incomplete line.
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no line break.
    scanned: usize,
    /// `data` values of the record being assembled.
    data_lines: Vec<String>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminal frame was seen or input ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed the next chunk and collect every frame it completes.
    ///
    /// After the terminal frame nothing further is returned, even if the
    /// chunk carried more records.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut scan = self.scanned;
        while let Some(offset) = buffer[scan..].iter().position(|b| *b == b'\n') {
            let end = scan + offset;
            let line = &buffer[start..end];
            start = end + 1;
            scan = start;
            if let Some(frame) = self.process_line(line) {
                let terminal = frame.is_terminal();
                frames.push(frame);
                if terminal {
                    self.stop();
                    return frames;
                }
            }
        }

        buffer.drain(..start);
        self.scanned = buffer.len();
        self.buffer = buffer;
        frames
    }

    /// Signal end of input. A record missing its closing blank line is still
    /// dispatched.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.finished {
            return None;
        }

        let rest = std::mem::take(&mut self.buffer);
        let mut frame = None;
        if !rest.is_empty() {
            frame = self.process_line(&rest);
        }
        if frame.is_none() {
            frame = self.dispatch();
        }
        self.stop();
        frame
    }

    fn stop(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        self.data_lines.clear();
    }

    fn process_line(&mut self, line: &[u8]) -> Option<StreamFrame> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment, typically a keep-alive.
        if line[0] == b':' {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };

        if field == DATA_FIELD {
            self.data_lines.push(value.to_string());
        } else {
            debug!("ignoring stream field {:?}", field);
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamFrame> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();

        match StreamFrame::parse_data(&data) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("skipping malformed frame {:?}: {}", data, err);
                None
            }
        }
    }
}

struct DecodeState {
    bytes: BoxStream<'static, Result<Bytes, TransportError>>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamFrame>,
    closed: bool,
}

/// Decode an async byte stream into frames.
///
/// Frames decoded before a read failure are yielded first, then the error,
/// then the stream ends. Reading stops at the terminal frame.
pub fn decode_stream<S, E>(
    bytes: S,
) -> impl Stream<Item = Result<StreamFrame, TransportError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<TransportError>,
{
    let state = DecodeState {
        bytes: bytes.map(|chunk| chunk.map_err(Into::into)).boxed(),
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
        closed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.closed || state.decoder.is_finished() {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(&chunk);
                    state.pending.extend(frames);
                }
                Some(Err(err)) => {
                    state.closed = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.closed = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.pending.push_back(frame);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "data: {\"content\":\"Hel\"}\n\n\
                        data: {\"content\":\"lo, \"}\n\n\
                        data: {\"content\":\"world!\"}\n\n\
                        data: [DONE]\n\n";

    fn delta(s: &str) -> StreamFrame {
        StreamFrame::Delta(s.to_string())
    }

    fn decode_in_chunks(body: &[u8], size: usize) -> Vec<StreamFrame> {
        let mut decoder = StreamDecoder::new();
        let mut frames = Vec::new();
        for chunk in body.chunks(size) {
            frames.extend(decoder.push(chunk));
        }
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_decodes_whole_body() {
        let frames = decode_in_chunks(BODY.as_bytes(), BODY.len());
        assert_eq!(
            frames,
            vec![delta("Hel"), delta("lo, "), delta("world!"), StreamFrame::Done]
        );
    }

    #[test]
    fn test_any_chunking_decodes_identically() {
        let whole = decode_in_chunks(BODY.as_bytes(), BODY.len());
        for size in 1..BODY.len() {
            assert_eq!(decode_in_chunks(BODY.as_bytes(), size), whole, "chunk size {size}");
        }
    }

    #[test]
    fn test_split_multibyte_character() {
        let body = "data: {\"content\":\"caf\u{e9} \u{1f600}\"}\n\n".as_bytes();
        // Every split point, including inside the two- and four-byte sequences.
        for split in 1..body.len() {
            let mut decoder = StreamDecoder::new();
            let mut frames = decoder.push(&body[..split]);
            frames.extend(decoder.push(&body[split..]));
            assert_eq!(frames, vec![delta("caf\u{e9} \u{1f600}")]);
        }
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let body = ": keep-alive\n\nevent: message\nid: 7\ndata: {\"content\":\"x\"}\n\n";
        assert_eq!(decode_in_chunks(body.as_bytes(), 5), vec![delta("x")]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let body = "data: {\"content\":\"a\"}\r\n\r\ndata: [DONE]\r\n\r\n";
        assert_eq!(
            decode_in_chunks(body.as_bytes(), 3),
            vec![delta("a"), StreamFrame::Done]
        );
    }

    #[test]
    fn test_data_without_space() {
        let body = "data:{\"content\":\"tight\"}\n\n";
        assert_eq!(decode_in_chunks(body.as_bytes(), 64), vec![delta("tight")]);
    }

    #[test]
    fn test_malformed_frame_skipped() {
        let body = "data: not json\n\ndata: {\"content\":\"ok\"}\n\n";
        assert_eq!(decode_in_chunks(body.as_bytes(), 64), vec![delta("ok")]);
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        let body = "data: {\"content\":\"\"}\n\ndata: {}\n\ndata: {\"content\":\"z\"}\n\n";
        assert_eq!(decode_in_chunks(body.as_bytes(), 64), vec![delta("z")]);
    }

    #[test]
    fn test_nothing_after_done() {
        let body = "data: [DONE]\n\ndata: {\"content\":\"late\"}\n\n";
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(body.as_bytes()), vec![StreamFrame::Done]);
        assert!(decoder.is_finished());
        assert!(decoder.push(b"data: {\"content\":\"later\"}\n\n").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_end_without_done() {
        let body = "data: {\"content\":\"Partial\"}\n\n";
        let frames = decode_in_chunks(body.as_bytes(), 4);
        assert_eq!(frames, vec![delta("Partial")]);
    }

    #[test]
    fn test_long_line_fed_byte_by_byte() {
        let content = "x".repeat(64 * 1024);
        let body = format!("data: {{\"content\":\"{content}\"}}\n\ndata: [DONE]\n\n");
        let frames = decode_in_chunks(body.as_bytes(), 1);
        assert_eq!(frames, vec![delta(&content), StreamFrame::Done]);
    }

    #[test]
    fn test_partial_line_kept_across_pushes() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(
            decoder.push(b"data: {\"content\":\"a\"}\n\ndata: {\"con"),
            vec![delta("a")]
        );
        assert_eq!(decoder.push(b"tent\":\"b\"}\n"), vec![]);
        assert_eq!(decoder.push(b"\n"), vec![delta("b")]);
    }

    #[test]
    fn test_unterminated_record_dispatched_at_finish() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), Some(delta("tail")));
        assert!(decoder.is_finished());
    }

    #[tokio::test]
    async fn test_decode_stream_yields_frames_then_error() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"data: {\"content\":\"Par")),
            Ok(Bytes::from_static(b"tial\"}\n\n")),
            Err(TransportError("connection reset".to_string())),
            Ok(Bytes::from_static(b"data: {\"content\":\"never\"}\n\n")),
        ];

        let items: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(
            items,
            vec![
                Ok(delta("Partial")),
                Err(TransportError("connection reset".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_done() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(BODY)),
            Err(std::io::Error::other("should not be read")),
        ];

        let items: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 4);
        assert_eq!(items.last(), Some(&Ok(StreamFrame::Done)));
    }
}
