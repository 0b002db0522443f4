//! Shared test harness for integration tests.
//!
//! Stub encoders are POSIX `sh` scripts that receive the working directory as
//! `$0`, so the pipeline can be exercised without ffmpeg.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use framecast::{
    DynamicImage, EncoderCommand, EncoderLauncher, FixedResolver, ForwardExit, Pipeline, Result,
    StreamOptions,
};
use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;

/// Writes a minimal playlist, then consumes frames until end of input.
pub const WRITES_PLAYLIST: &str =
    "printf '#EXTM3U\\n#EXT-X-VERSION:3\\n' > \"$0/stream.m3u8\"; exec cat > /dev/null";

/// Consumes frames but never produces a playlist.
pub const NEVER_WRITES: &str = "exec cat > /dev/null";

/// Exits immediately without reading.
pub const EXITS: &str = "exit 0";

/// Launches `sh -c <script> <working dir>`.
#[derive(Debug, Clone, Copy)]
pub struct StubEncoder(pub &'static str);

impl EncoderLauncher for StubEncoder {
    fn command(&self, dir: &Path, _options: &StreamOptions) -> Result<EncoderCommand> {
        let mut cmd = EncoderCommand::new("sh");
        cmd.args(["-c", self.0]);
        cmd.arg(dir.to_string_lossy().to_string());
        Ok(cmd)
    }
}

/// 64x64, 10 fps, 1 s segments, auto port.
pub fn small_options() -> StreamOptions {
    StreamOptions {
        width: 64,
        height: 64,
        frame_rate: 10,
        segment_duration: 1,
        port: 0,
        ..StreamOptions::default()
    }
}

pub fn loopback() -> FixedResolver {
    FixedResolver::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// A pipeline driven by a stub encoder and publishing loopback URLs.
pub fn stub_pipeline(script: &'static str) -> Pipeline {
    Pipeline::new(small_options())
        .with_launcher(StubEncoder(script))
        .with_resolver(loopback())
}

pub fn solid_frame(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
}

/// A channel preloaded with `count` solid frames and then closed.
pub fn finite_source(count: usize, width: u32, height: u32) -> mpsc::Receiver<DynamicImage> {
    let (tx, rx) = mpsc::channel(count.max(1));
    for i in 0..count {
        let shade = (i * 8 % 256) as u8;
        tx.try_send(solid_frame(width, height, [shade, 64, 255 - shade, 255]))
            .expect("channel sized for all frames");
    }
    rx
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Whether a TCP connection to the loopback `port` succeeds.
pub async fn port_accepts(port: u16) -> bool {
    tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// Poll until the forwarding task has ended, for at most five seconds.
pub async fn wait_for_exit(pipeline: &Pipeline) -> Option<ForwardExit> {
    for _ in 0..250 {
        if let Some(exit) = pipeline.stats().forwarding_exit {
            return Some(exit);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}
