//! Frame source boundary.
//!
//! A source yields frames until its producer signals end-of-source. Bounded
//! channels are the usual choice: a full channel throttles the producer when
//! the encoder falls behind.

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::mpsc;

/// Anything that can hand out frames one at a time.
///
/// `next_frame` must be cancel-safe: the forwarding task drops the pending
/// future when the pipeline is stopped.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// The next frame, or `None` once the producer is done.
    async fn next_frame(&mut self) -> Option<DynamicImage>;
}

#[async_trait]
impl FrameSource for mpsc::Receiver<DynamicImage> {
    async fn next_frame(&mut self) -> Option<DynamicImage> {
        self.recv().await
    }
}

#[async_trait]
impl FrameSource for mpsc::UnboundedReceiver<DynamicImage> {
    async fn next_frame(&mut self) -> Option<DynamicImage> {
        self.recv().await
    }
}
