//! # fc-av
//!
//! External encoder management for the framecast pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to
//!   ffmpeg, honouring an explicit override.
//! - **Encoder command** ([`EncoderCommand`], [`EncoderLauncher`]) -- the
//!   raw-video-in, HLS-out invocation and the seam through which callers
//!   substitute their own child process.
//! - **Encoder adapter** ([`EncoderProcess`], [`EncoderInput`]) -- a
//!   long-lived child fed one raw frame at a time over stdin, with a
//!   two-phase shutdown.
//! - **Workspace management** ([`Workspace`]) -- the private temporary
//!   directory the encoder writes its playlist and segments into.

pub mod command;
pub mod encoder;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{EncoderCommand, EncoderLauncher, FfmpegLauncher};
pub use encoder::{EncoderInput, EncoderProcess};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::Workspace;
