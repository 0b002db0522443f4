//! Forwarding counters.
//!
//! The forwarding task updates these lock-free; [`crate::Pipeline::stats`]
//! returns a [`PipelineStats`] snapshot. Counters are reset at every start.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Why the forwarding task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardExit {
    /// The frame source was closed by its producer.
    SourceClosed,
    /// `stop` was called or the caller's token was cancelled.
    Cancelled,
    /// A write to the encoder failed; the child is presumed gone.
    EncoderGone,
}

impl ForwardExit {
    fn to_u8(self) -> u8 {
        match self {
            ForwardExit::SourceClosed => 1,
            ForwardExit::Cancelled => 2,
            ForwardExit::EncoderGone => 3,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ForwardExit::SourceClosed),
            2 => Some(ForwardExit::Cancelled),
            3 => Some(ForwardExit::EncoderGone),
            _ => None,
        }
    }
}

/// Point-in-time view of the forwarding counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Frames written to the encoder.
    pub frames_forwarded: u64,
    /// Frames rejected for not matching the configured resolution.
    pub frames_dropped: u64,
    /// Set once the forwarding task has ended.
    pub forwarding_exit: Option<ForwardExit>,
}

#[derive(Debug, Default)]
pub(crate) struct FrameCounters {
    forwarded: AtomicU64,
    dropped: AtomicU64,
    exit: AtomicU8,
}

impl FrameCounters {
    pub(crate) fn reset(&self) {
        self.forwarded.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.exit.store(0, Ordering::Release);
    }

    pub(crate) fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the drop count including this one.
    pub(crate) fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn finish(&self, exit: ForwardExit) {
        self.exit.store(exit.to_u8(), Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_forwarded: self.forwarded.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            forwarding_exit: ForwardExit::from_u8(self.exit.load(Ordering::Acquire)),
        }
    }
}
