//! fc-core: shared error type, stream options, and the raw frame buffer.
//!
//! This crate is the foundational dependency for the other fc-* crates and
//! the `framecast` pipeline. It has no async runtime dependency.

pub mod config;
pub mod error;
pub mod frame;

// Re-export the most commonly used items at the crate root.
pub use config::StreamOptions;
pub use error::{Error, Result};
pub use frame::RawFrameBuffer;
