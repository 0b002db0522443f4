//! Unified error type for framecast.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. The
//! variants follow the lifecycle of a pipeline run: caller misuse, resource
//! acquisition during start, per-frame rejection, child-process failure, and
//! timeouts.

use std::net::SocketAddr;
use std::process::ExitStatus;
use std::time::Duration;

/// Unified error type covering all failure modes in framecast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `start` was called on a pipeline that is not idle.
    #[error("pipeline already running")]
    AlreadyRunning,

    /// An operation that needs a started pipeline was called before `start`.
    #[error("pipeline not started")]
    NotStarted,

    /// The private working directory could not be created.
    #[error("failed to create working directory: {source}")]
    WorkingDir {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The origin server could not bind its listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The encoder executable could not be located or launched.
    #[error("failed to spawn {tool}: {message}")]
    Spawn {
        /// Name of the executable.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A raw frame buffer had the wrong byte length.
    #[error("invalid frame size: got {actual} bytes, expected {expected}")]
    FrameSize {
        /// Required length (width x height x 4).
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// A frame's pixel dimensions did not match the configured resolution.
    #[error(
        "frame size mismatch: got {}x{}, expected {}x{}",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    FrameDimensions {
        /// Configured (width, height).
        expected: (u32, u32),
        /// Frame (width, height).
        actual: (u32, u32),
    },

    /// Writing to the encoder's stdin failed; the child is presumed gone.
    #[error("encoder gone: {message}")]
    EncoderGone {
        /// Human-readable error description.
        message: String,
    },

    /// The encoder exited with a non-zero status.
    #[error("encoder exited with {status}")]
    EncoderExit {
        /// Exit status reported by the OS.
        status: ExitStatus,
    },

    /// An operation did not complete within its allotted time.
    #[error("timed out after {after:?} waiting for {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The elapsed budget.
        after: Duration,
    },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration failed to parse or validate.
    #[error("validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable snake_case code, used as a structured log field.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Error::AlreadyRunning => "already_running",
            Error::NotStarted => "not_started",
            Error::WorkingDir { .. } => "working_dir",
            Error::Bind { .. } => "bind",
            Error::Spawn { .. } => "spawn",
            Error::FrameSize { .. } => "frame_size",
            Error::FrameDimensions { .. } => "frame_dimensions",
            Error::EncoderGone { .. } => "encoder_gone",
            Error::EncoderExit { .. } => "encoder_exit",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled => "cancelled",
            Error::Validation(_) => "validation",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether this error ends the current run (the child process is gone or
    /// failed). Such errors never trigger an automatic restart.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Error::EncoderGone { .. } | Error::EncoderExit { .. })
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EncoderGone`].
    pub fn encoder_gone(message: impl Into<String>) -> Self {
        Error::EncoderGone {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Timeout`].
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn already_running_display() {
        let err = Error::AlreadyRunning;
        assert_eq!(err.to_string(), "pipeline already running");
        assert_eq!(err.kind_str(), "already_running");
    }

    #[test]
    fn frame_size_display() {
        let err = Error::FrameSize {
            expected: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "invalid frame size: got 12 bytes, expected 16"
        );
        assert!(!err.is_fatal_to_run());
    }

    #[test]
    fn frame_dimensions_display() {
        let err = Error::FrameDimensions {
            expected: (64, 64),
            actual: (32, 48),
        };
        assert_eq!(
            err.to_string(),
            "frame size mismatch: got 32x48, expected 64x64"
        );
    }

    #[test]
    fn spawn_display() {
        let err = Error::spawn("ffmpeg", "not found in PATH");
        assert_eq!(err.to_string(), "failed to spawn ffmpeg: not found in PATH");
        assert_eq!(err.kind_str(), "spawn");
    }

    #[test]
    fn encoder_gone_is_fatal() {
        let err = Error::encoder_gone("broken pipe");
        assert!(err.is_fatal_to_run());
        assert_eq!(err.to_string(), "encoder gone: broken pipe");
    }

    #[test]
    fn timeout_display() {
        let err = Error::timeout("playlist", Duration::from_millis(250));
        assert_eq!(err.to_string(), "timed out after 250ms waiting for playlist");
        assert!(!err.is_fatal_to_run());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert_matches!(err, Error::Io { .. });
        assert_eq!(err.kind_str(), "io");
    }

    #[test]
    fn bind_display_includes_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let err = Error::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:8080"));
    }
}
