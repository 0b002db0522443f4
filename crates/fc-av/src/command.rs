//! Builder for the long-lived encoder child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use fc_core::config::PLAYLIST_NAME;
use fc_core::StreamOptions;
use tokio::process::{Child, Command};

use crate::tools::ToolRegistry;

/// A program plus arguments, spawned with piped stdin and stderr.
///
/// # Example
///
/// ```no_run
/// use fc_av::EncoderCommand;
/// use fc_core::StreamOptions;
/// use std::path::Path;
///
/// let cmd = EncoderCommand::ffmpeg("ffmpeg", Path::new("/tmp/out"), &StreamOptions::default());
/// assert!(cmd.args_list().iter().any(|a| a == "rawvideo"));
/// ```
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl EncoderCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The canonical raw-RGBA-in, rolling-HLS-out ffmpeg invocation writing
    /// into `dir`.
    pub fn ffmpeg(program: impl Into<PathBuf>, dir: &Path, options: &StreamOptions) -> Self {
        let playlist = dir.join(PLAYLIST_NAME);

        // One keyframe per segment so segments close on schedule while input
        // is still open.
        let gop = options
            .frame_rate
            .saturating_mul(options.segment_duration)
            .max(1)
            .to_string();

        let mut cmd = Self::new(program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgba"]);
        cmd.arg("-s").arg(options.resolution());
        cmd.arg("-r").arg(options.frame_rate.to_string());
        cmd.args(["-i", "pipe:0"]);
        cmd.args(["-c:v", "libx264", "-preset", "ultrafast", "-tune", "zerolatency"]);
        cmd.arg("-g").arg(gop.as_str());
        cmd.arg("-keyint_min").arg(gop);
        cmd.args(["-sc_threshold", "0"]);
        cmd.args(["-pix_fmt", "yuv420p"]);
        cmd.args(["-f", "hls"]);
        cmd.arg("-hls_time").arg(options.segment_duration.to_string());
        cmd.arg("-hls_list_size").arg(options.list_size.to_string());
        cmd.args(["-hls_flags", "delete_segments"]);
        cmd.arg(playlist.to_string_lossy().as_ref());
        cmd
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args_list(&self) -> &[String] {
        &self.args
    }

    /// File name of the program, for log fields and error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Spawn the child. It is killed if the returned handle is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(&self) -> fc_core::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| fc_core::Error::spawn(self.program_name(), e.to_string()))
    }
}

/// Produces the encoder command for a pipeline run.
///
/// Implemented by [`FfmpegLauncher`] in production; tests substitute stub
/// programs that read stdin and write (or never write) a playlist.
pub trait EncoderLauncher: Send + Sync {
    /// Build the command that encodes into `dir`.
    fn command(&self, dir: &Path, options: &StreamOptions) -> fc_core::Result<EncoderCommand>;
}

/// Launches ffmpeg, located via [`ToolRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLauncher;

impl EncoderLauncher for FfmpegLauncher {
    fn command(&self, dir: &Path, options: &StreamOptions) -> fc_core::Result<EncoderCommand> {
        let tools = ToolRegistry::discover(options.ffmpeg_path.as_deref());
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(EncoderCommand::ffmpeg(ffmpeg, dir, options))
    }
}
