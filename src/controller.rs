//! The pipeline controller.
//!
//! A [`Pipeline`] moves through `Idle -> Starting -> Running -> Stopping ->
//! Idle`. Starting acquires, in order, a working directory, the origin server
//! and the encoder, then launches the forwarding task. Any failure releases
//! what was already acquired. Stopping tears down in the reverse order and
//! always runs every step, reporting the first error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fc_av::{EncoderLauncher, EncoderProcess, FfmpegLauncher, Workspace};
use fc_core::{Error, RawFrameBuffer, Result, StreamOptions};
use fc_server::{AddressResolver, OriginServer, RouteResolver};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::forward::{forward_frames, Forwarded};
use crate::readiness::ReadinessProbe;
use crate::source::FrameSource;
use crate::stats::{FrameCounters, PipelineStats};

/// Lifecycle state of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources owned by one Start/Stop cycle.
struct ActiveRun {
    workspace: Workspace,
    server: OriginServer,
    encoder: EncoderProcess,
    cancel: CancellationToken,
    forwarder: JoinHandle<Forwarded>,
}

/// Values readable without waiting on a start or stop in progress.
#[derive(Debug, Default)]
struct Published {
    url: Option<String>,
    port: Option<u16>,
    working_dir: Option<PathBuf>,
    playlist: Option<PathBuf>,
}

/// Streams frames from a [`FrameSource`] to an HLS playlist served over HTTP.
///
/// One pipeline runs at most one stream at a time. `start` and `stop` take
/// `&self`, so a pipeline can be shared behind an `Arc`.
pub struct Pipeline {
    options: StreamOptions,
    launcher: Arc<dyn EncoderLauncher>,
    resolver: Arc<dyn AddressResolver>,
    run: Mutex<Option<ActiveRun>>,
    state: watch::Sender<PipelineState>,
    published: RwLock<Published>,
    counters: Arc<FrameCounters>,
}

impl Pipeline {
    /// Create an idle pipeline. Zero-valued options other than `port` take
    /// their defaults; configuration warnings are logged.
    pub fn new(options: StreamOptions) -> Self {
        let options = options.with_defaults();
        for warning in options.validate() {
            tracing::warn!("Stream options: {warning}");
        }

        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            options,
            launcher: Arc::new(FfmpegLauncher),
            resolver: Arc::new(RouteResolver::default()),
            run: Mutex::new(None),
            state,
            published: RwLock::new(Published::default()),
            counters: Arc::new(FrameCounters::default()),
        }
    }

    /// Replace the encoder launcher.
    pub fn with_launcher(mut self, launcher: impl EncoderLauncher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Replace the resolver that picks the host of published URLs.
    pub fn with_resolver(mut self, resolver: impl AddressResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Effective options, defaults applied.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// The URL returned by the last successful start, `None` if never started.
    pub fn url(&self) -> Option<String> {
        self.published.read().url.clone()
    }

    /// Port bound by the current or last run.
    pub fn port(&self) -> Option<u16> {
        self.published.read().port
    }

    /// The working directory, while running.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.published.read().working_dir.clone()
    }

    /// Counters of the current or last run.
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Start streaming frames from `source`.
    ///
    /// Returns the public playlist URL as soon as the origin server is
    /// listening and the encoder is running; the stream becomes playable
    /// later (see [`Pipeline::wait_ready`]). Cancelling `cancel` ends frame
    /// forwarding. Resources are released only by [`Pipeline::stop`].
    pub async fn start<S: FrameSource>(
        &self,
        cancel: &CancellationToken,
        source: S,
    ) -> Result<String> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(Error::AlreadyRunning);
        }
        self.set_state(PipelineState::Starting);

        match self.acquire(cancel, source).await {
            Ok(active) => {
                let url = active.server.url().to_string();
                let port = active.server.port();
                {
                    let mut published = self.published.write();
                    published.url = Some(url.clone());
                    published.port = Some(port);
                    published.working_dir = Some(active.workspace.path().to_path_buf());
                    published.playlist = Some(active.workspace.playlist_path());
                }
                tracing::info!(
                    url = %url,
                    encoder = active.encoder.tool(),
                    dir = %active.workspace.path().display(),
                    resolution = %self.options.resolution(),
                    frame_rate = self.options.frame_rate,
                    "Pipeline started"
                );
                *run = Some(active);
                self.set_state(PipelineState::Running);
                Ok(url)
            }
            Err(e) => {
                tracing::error!(kind = e.kind_str(), "Pipeline failed to start: {e}");
                self.set_state(PipelineState::Idle);
                Err(e)
            }
        }
    }

    async fn acquire<S: FrameSource>(
        &self,
        cancel: &CancellationToken,
        source: S,
    ) -> Result<ActiveRun> {
        let workspace = Workspace::create()?;

        let mut server =
            match OriginServer::start(workspace.path(), self.options.port, &*self.resolver).await {
                Ok(server) => server,
                Err(e) => {
                    release(None, workspace, self.options.server_shutdown_timeout()).await;
                    return Err(e);
                }
            };

        let encoder = self
            .launcher
            .command(workspace.path(), &self.options)
            .and_then(|cmd| EncoderProcess::start(&cmd, self.options.frame_len()));
        let mut encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => {
                release(Some(&mut server), workspace, self.options.server_shutdown_timeout())
                    .await;
                return Err(e);
            }
        };

        let Some(input) = encoder.take_input() else {
            if let Err(e) = encoder.kill().await {
                tracing::error!("Failed to kill encoder during start rollback: {e}");
            }
            release(Some(&mut server), workspace, self.options.server_shutdown_timeout()).await;
            return Err(Error::Internal("encoder started without input".into()));
        };

        let run_cancel = cancel.child_token();
        self.counters.reset();
        let forwarder = tokio::spawn(forward_frames(
            source,
            input,
            RawFrameBuffer::new(self.options.width, self.options.height),
            run_cancel.clone(),
            self.counters.clone(),
        ));

        Ok(ActiveRun {
            workspace,
            server,
            encoder,
            cancel: run_cancel,
            forwarder,
        })
    }

    /// Tear down the current run.
    ///
    /// Stops frame forwarding, closes the encoder so it can finalize its
    /// segments, stops the origin server and removes the working directory.
    /// Every step runs even if an earlier one fails; the first error is
    /// returned. Stopping an idle pipeline is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        let Some(active) = run.take() else {
            return Ok(());
        };
        self.set_state(PipelineState::Stopping);

        let ActiveRun {
            workspace,
            mut server,
            mut encoder,
            cancel,
            mut forwarder,
        } = active;
        let grace = self.options.encoder_shutdown_timeout();
        let mut first_error = None;

        cancel.cancel();
        let mut killed = false;
        let joined = match tokio::time::timeout(grace, &mut forwarder).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                // The task is blocked writing into a child that stopped reading.
                tracing::warn!(grace = ?grace, "Frame forwarding did not stop; killing encoder");
                keep_first(
                    &mut first_error,
                    "stop frame forwarding",
                    Err(Error::timeout("frame forwarding shutdown", grace)),
                );
                keep_first(&mut first_error, "kill encoder", encoder.kill().await);
                killed = true;
                match tokio::time::timeout(grace, &mut forwarder).await {
                    Ok(joined) => joined,
                    Err(_elapsed) => {
                        forwarder.abort();
                        forwarder.await
                    }
                }
            }
        };
        match joined {
            Ok(forwarded) => {
                tracing::debug!(exit = ?forwarded.exit, "Frame forwarding joined");
                encoder.restore_input(forwarded.input);
            }
            Err(e) => keep_first(
                &mut first_error,
                "join frame forwarding",
                Err(Error::Internal(format!("frame forwarding task failed: {e}"))),
            ),
        }

        if !killed {
            keep_first(&mut first_error, "close encoder", encoder.close(grace).await);
        }
        keep_first(
            &mut first_error,
            "stop origin server",
            server.stop(self.options.server_shutdown_timeout()).await,
        );
        keep_first(&mut first_error, "remove working directory", workspace.remove());

        {
            let mut published = self.published.write();
            published.working_dir = None;
            published.playlist = None;
        }
        self.set_state(PipelineState::Idle);

        let stats = self.counters.snapshot();
        tracing::info!(
            forwarded = stats.frames_forwarded,
            dropped = stats.frames_dropped,
            clean = first_error.is_none(),
            "Pipeline stopped"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Wait until the encoder has written a non-empty playlist.
    ///
    /// [`Error::NotStarted`] if there is no current run, [`Error::Timeout`]
    /// if `timeout` elapses first (the pipeline keeps running) and
    /// [`Error::Cancelled`] if `cancel` fires first.
    pub async fn wait_ready(&self, cancel: &CancellationToken, timeout: Duration) -> Result<()> {
        let Some(playlist) = self.published.read().playlist.clone() else {
            return Err(Error::NotStarted);
        };
        ReadinessProbe::new(playlist)
            .wait(cancel, timeout)
            .await
    }

    fn set_state(&self, next: PipelineState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "Pipeline state changed");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // The child is killed on drop and the directory removed with the
        // workspace; only the forwarding task needs stopping here.
        if let Some(active) = self.run.get_mut().take() {
            tracing::warn!("Pipeline dropped while running");
            active.cancel.cancel();
            active.forwarder.abort();
        }
    }
}

/// Release resources acquired by a start that did not complete.
async fn release(server: Option<&mut OriginServer>, workspace: Workspace, deadline: Duration) {
    if let Some(server) = server {
        if let Err(e) = server.stop(deadline).await {
            tracing::error!("Failed to stop origin server during start rollback: {e}");
        }
    }
    let dir = workspace.path().to_path_buf();
    if let Err(e) = workspace.remove() {
        tracing::error!(dir = %dir.display(), "Failed to remove working directory: {e}");
    }
}

fn keep_first(first: &mut Option<Error>, step: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::error!(step, kind = e.kind_str(), "Teardown step failed: {e}");
        first.get_or_insert(e);
    }
}
