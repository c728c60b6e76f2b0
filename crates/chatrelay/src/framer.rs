//! Wire framer: upstream deltas to event-stream bytes.
//!
//! Frames are produced lazily, one per upstream item, so nothing is buffered
//! between the upstream read and the response write.

use std::convert::Infallible;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use tracing::{debug, warn};

use chatrelay_protocol::StreamFrame;

use crate::upstream::DeltaStream;

enum FramerState {
    Streaming { deltas: DeltaStream, frames: usize },
    Finished,
}

/// Frame an upstream delta stream for the wire.
///
/// - each non-empty delta becomes one `delta` frame, empty deltas are dropped;
/// - natural completion appends exactly one `done` frame;
/// - an upstream error is logged and the body ends right there with no `done`
///   frame. Frames already written stay deliverable to the caller.
pub fn frame_deltas(deltas: DeltaStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    stream::unfold(
        FramerState::Streaming { deltas, frames: 0 },
        |state| async move {
            let FramerState::Streaming { mut deltas, frames } = state else {
                return None;
            };

            loop {
                match deltas.next().await {
                    Some(Ok(delta)) => {
                        let Some(frame) = StreamFrame::delta(delta) else {
                            continue;
                        };
                        let bytes = Bytes::from(frame.encode());
                        let next = FramerState::Streaming {
                            deltas,
                            frames: frames + 1,
                        };
                        return Some((Ok(bytes), next));
                    }
                    Some(Err(err)) => {
                        warn!(
                            error = %err,
                            frames,
                            "Upstream failed mid-stream, ending relay without done"
                        );
                        return None;
                    }
                    None => {
                        debug!(frames, "Upstream completed");
                        let bytes = Bytes::from(StreamFrame::Done.encode());
                        return Some((Ok(bytes), FramerState::Finished));
                    }
                }
            }
        },
    )
}
