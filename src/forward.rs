//! The frame-forwarding task.
//!
//! Drains a [`FrameSource`] into the encoder's stdin, one raw frame at a
//! time, through a single reused buffer. Cancellation is checked between
//! frames, never in the middle of a write.

use std::sync::Arc;

use fc_av::EncoderInput;
use fc_core::RawFrameBuffer;
use tokio_util::sync::CancellationToken;

use crate::source::FrameSource;
use crate::stats::{ForwardExit, FrameCounters};

/// Log the first dimension mismatch and then every Nth.
const DROP_LOG_EVERY: u64 = 100;

/// What the task hands back to the controller when it ends.
#[derive(Debug)]
pub(crate) struct Forwarded {
    /// The encoder input, returned so teardown can close it.
    pub input: EncoderInput,
    pub exit: ForwardExit,
}

pub(crate) async fn forward_frames<S: FrameSource>(
    mut source: S,
    mut input: EncoderInput,
    mut buf: RawFrameBuffer,
    cancel: CancellationToken,
    counters: Arc<FrameCounters>,
) -> Forwarded {
    tracing::debug!(
        width = buf.width(),
        height = buf.height(),
        "Frame forwarding started"
    );

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ForwardExit::Cancelled,
            frame = source.next_frame() => frame,
        };
        let Some(frame) = next else {
            break ForwardExit::SourceClosed;
        };

        if let Err(e) = buf.fill_from(&frame) {
            let dropped = counters.record_dropped();
            if dropped == 1 || dropped % DROP_LOG_EVERY == 0 {
                tracing::warn!(dropped, "Dropping frame: {e}");
            }
            continue;
        }

        if cancel.is_cancelled() {
            break ForwardExit::Cancelled;
        }

        if let Err(e) = input.write_frame(buf.as_bytes()).await {
            tracing::warn!(kind = e.kind_str(), "Stopping frame forwarding: {e}");
            break ForwardExit::EncoderGone;
        }
        counters.record_forwarded();
    };

    counters.finish(exit);
    let stats = counters.snapshot();
    tracing::info!(
        exit = ?exit,
        forwarded = stats.frames_forwarded,
        dropped = stats.frames_dropped,
        "Frame forwarding ended"
    );

    Forwarded { input, exit }
}
