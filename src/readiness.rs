//! Readiness probe.
//!
//! The encoder creates its playlist asynchronously, so the only observable
//! sign that a stream is playable is a non-empty playlist file in the working
//! directory. [`ReadinessProbe`] polls for it.

use std::path::PathBuf;
use std::time::Duration;

use fc_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default interval between playlist checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls for a non-empty playlist file.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    playlist: PathBuf,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new(playlist: impl Into<PathBuf>) -> Self {
        Self {
            playlist: playlist.into(),
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether the playlist exists and has content right now.
    pub async fn is_ready(&self) -> bool {
        tokio::fs::metadata(&self.playlist)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    /// Poll until the playlist is ready.
    ///
    /// Returns [`Error::Timeout`] if `timeout` elapses first and
    /// [`Error::Cancelled`] if `cancel` fires first. A timeout only means
    /// "not yet ready"; the pipeline keeps running.
    pub async fn wait(&self, cancel: &CancellationToken, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.is_ready().await {
                tracing::debug!(playlist = %self.playlist.display(), "Stream ready");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout("stream playlist", timeout));
            }
            tracing::trace!(playlist = %self.playlist.display(), "Playlist not ready yet");

            let nap = self.interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }
}
