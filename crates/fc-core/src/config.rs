//! Stream configuration.
//!
//! [`StreamOptions`] is deserialized from JSON and carries everything a
//! pipeline run needs: resolution, frame rate, segment timing, the HTTP port,
//! and the shutdown budgets. Every field defaults sensibly so an empty `{}`
//! document is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_SEGMENT_DURATION: u32 = 2;
pub const DEFAULT_LIST_SIZE: u32 = 5;
pub const DEFAULT_ENCODER_SHUTDOWN_SECS: u64 = 10;
pub const DEFAULT_SERVER_SHUTDOWN_SECS: u64 = 5;

/// File name of the HLS playlist inside the working directory.
pub const PLAYLIST_NAME: &str = "stream.m3u8";

/// Bytes per pixel of the raw frames handed to the encoder (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Options for one streaming pipeline. Immutable once a pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Target HLS segment duration in seconds.
    pub segment_duration: u32,
    /// HTTP port. 0 lets the OS choose.
    pub port: u16,
    /// Number of segments kept in the rolling playlist window.
    pub list_size: u32,
    /// Explicit encoder executable. Falls back to `ffmpeg` on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
    /// Grace period for the encoder to exit after its input is closed.
    pub encoder_shutdown_timeout_secs: u64,
    /// Deadline for in-flight HTTP responses when the server stops.
    pub server_shutdown_timeout_secs: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_rate: DEFAULT_FRAME_RATE,
            segment_duration: DEFAULT_SEGMENT_DURATION,
            port: 0,
            list_size: DEFAULT_LIST_SIZE,
            ffmpeg_path: None,
            encoder_shutdown_timeout_secs: DEFAULT_ENCODER_SHUTDOWN_SECS,
            server_shutdown_timeout_secs: DEFAULT_SERVER_SHUTDOWN_SECS,
        }
    }
}

impl StreamOptions {
    /// Return a copy with every zero numeric field replaced by its default.
    ///
    /// `port` is left alone: 0 is meaningful ("auto-assign").
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();

        if self.width == 0 {
            self.width = defaults.width;
        }
        if self.height == 0 {
            self.height = defaults.height;
        }
        if self.frame_rate == 0 {
            self.frame_rate = defaults.frame_rate;
        }
        if self.segment_duration == 0 {
            self.segment_duration = defaults.segment_duration;
        }
        if self.list_size == 0 {
            self.list_size = defaults.list_size;
        }
        if self.encoder_shutdown_timeout_secs == 0 {
            self.encoder_shutdown_timeout_secs = defaults.encoder_shutdown_timeout_secs;
        }
        if self.server_shutdown_timeout_secs == 0 {
            self.server_shutdown_timeout_secs = defaults.server_shutdown_timeout_secs;
        }

        self
    }

    /// Deserialize options from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("options parse error: {e}")))
    }

    /// Load options from a file path, falling back to defaults if the path
    /// is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse options file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No options file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read options file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.width % 2 != 0 || self.height % 2 != 0 {
            warnings.push(format!(
                "resolution {} has an odd dimension; yuv420p output requires even width and height",
                self.resolution()
            ));
        }

        if self.frame_rate > 120 {
            warnings.push(format!(
                "frame_rate {} is unusually high for a live stream",
                self.frame_rate
            ));
        }

        if self.list_size < 2 {
            warnings.push(format!(
                "list_size {} leaves players no buffer between segments",
                self.list_size
            ));
        }

        if let Some(ref p) = self.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "ffmpeg_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        warnings
    }

    /// Size in bytes of one raw RGBA frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Resolution formatted as `WxH`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn encoder_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.encoder_shutdown_timeout_secs)
    }

    pub fn server_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server_shutdown_timeout_secs)
    }
}
