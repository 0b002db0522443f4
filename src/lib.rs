//! framecast - live raster frames to an HTTP-served HLS stream.
//!
//! A [`Pipeline`] takes frames from a [`FrameSource`], pipes them as raw RGBA
//! into an ffmpeg child that writes a rolling HLS playlist into a private
//! temporary directory, and serves that directory over HTTP.
//!
//! ```no_run
//! # async fn demo() -> framecast::Result<()> {
//! use framecast::{DynamicImage, Pipeline, StreamOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::new(StreamOptions::default());
//! let (tx, rx) = tokio::sync::mpsc::channel::<DynamicImage>(8);
//! let cancel = CancellationToken::new();
//!
//! let url = pipeline.start(&cancel, rx).await?;
//! pipeline.wait_ready(&cancel, std::time::Duration::from_secs(10)).await?;
//! println!("playing at {url}");
//! # drop(tx);
//! pipeline.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
mod forward;
pub mod readiness;
pub mod source;
pub mod stats;

pub use controller::{Pipeline, PipelineState};
pub use readiness::ReadinessProbe;
pub use source::FrameSource;
pub use stats::{ForwardExit, PipelineStats};

pub use fc_av::{EncoderCommand, EncoderLauncher, FfmpegLauncher};
pub use fc_core::{Error, Result, StreamOptions};
pub use fc_server::{AddressResolver, FixedResolver, RouteResolver};
pub use image::DynamicImage;
