//! Subprocess encoder adapter.
//!
//! An [`EncoderProcess`] owns a child that reads fixed-size raw RGBA frames
//! from stdin. The writable half ([`EncoderInput`]) can be detached so a
//! forwarding task owns it exclusively while the controller keeps the process
//! handle for shutdown.
//!
//! Shutdown is two-phase: closing stdin signals end-of-stream so the encoder
//! can flush its final segments; if it has not exited within the grace period
//! it is killed.

use std::process::ExitStatus;
use std::time::Duration;

use fc_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin};
use tokio::task::JoinHandle;

use crate::command::EncoderCommand;

/// How long to wait for the stderr forwarder after the child exits.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Writable half of an encoder: the child's stdin plus the expected frame
/// length.
#[derive(Debug)]
pub struct EncoderInput {
    stdin: ChildStdin,
    frame_len: usize,
}

impl EncoderInput {
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Write exactly one raw frame.
    ///
    /// A buffer of the wrong length is rejected with [`Error::FrameSize`]
    /// before anything is written. A failed write means the child has exited
    /// or closed its input; it is reported as [`Error::EncoderGone`] and must
    /// not be retried.
    pub async fn write_frame(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() != self.frame_len {
            return Err(Error::FrameSize {
                expected: self.frame_len,
                actual: buf.len(),
            });
        }

        self.stdin
            .write_all(buf)
            .await
            .map_err(|e| Error::encoder_gone(format!("failed to write frame: {e}")))
    }
}

/// A running encoder child process.
#[derive(Debug)]
pub struct EncoderProcess {
    tool: String,
    child: Child,
    input: Option<EncoderInput>,
    stderr_task: Option<JoinHandle<()>>,
}

impl EncoderProcess {
    /// Spawn `command` and take ownership of its stdin.
    ///
    /// Fails with [`Error::Spawn`] if the program cannot be launched.
    pub fn start(command: &EncoderCommand, frame_len: usize) -> Result<Self> {
        let tool = command.program_name();
        let mut child = command.spawn()?;

        let Some(stdin) = child.stdin.take() else {
            return Err(Error::spawn(tool, "child has no stdin pipe"));
        };
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| forward_stderr(tool.clone(), stderr));

        tracing::info!(tool = %tool, pid = ?child.id(), frame_len, "Encoder started");

        Ok(Self {
            tool,
            child,
            input: Some(EncoderInput { stdin, frame_len }),
            stderr_task,
        })
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// OS process id, or `None` once the child has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking exit check.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Write one frame through the attached input.
    pub async fn write_frame(&mut self, buf: &[u8]) -> Result<()> {
        match self.input.as_mut() {
            Some(input) => input.write_frame(buf).await,
            None => Err(Error::Internal("encoder input is detached".into())),
        }
    }

    /// Detach the writable half.
    pub fn take_input(&mut self) -> Option<EncoderInput> {
        self.input.take()
    }

    /// Re-attach a writable half previously returned by [`take_input`].
    ///
    /// [`take_input`]: EncoderProcess::take_input
    pub fn restore_input(&mut self, input: EncoderInput) {
        self.input = Some(input);
    }

    /// Close stdin, then wait up to `grace` for the child to exit.
    ///
    /// A non-zero exit is [`Error::EncoderExit`]. If the child is still
    /// running when `grace` elapses it is killed and [`Error::Timeout`] is
    /// returned.
    pub async fn close(&mut self, grace: Duration) -> Result<()> {
        // Dropping stdin delivers EOF to the child.
        drop(self.input.take());

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.drain_stderr().await;
                tracing::info!(tool = %self.tool, %status, "Encoder exited");
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::EncoderExit { status })
                }
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => {
                tracing::warn!(
                    tool = %self.tool,
                    grace = ?grace,
                    "Encoder did not exit after end of input; killing"
                );
                self.kill().await?;
                Err(Error::timeout("encoder exit", grace))
            }
        }
    }

    /// Forcibly terminate the child and reap it.
    pub async fn kill(&mut self) -> Result<()> {
        drop(self.input.take());

        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
            tracing::info!(tool = %self.tool, "Encoder killed");
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn drain_stderr(&mut self) {
        if let Some(mut task) = self.stderr_task.take() {
            if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Relay the child's stderr into the log, one line per event.
fn forward_stderr(tool: String, stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => tracing::debug!(tool = %tool, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    tracing::trace!(tool = %tool, "stderr read error: {e}");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sh(script: &str) -> EncoderCommand {
        let mut cmd = EncoderCommand::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn start_nonexistent_program_is_spawn_error() {
        let err = EncoderProcess::start(&EncoderCommand::new("nonexistent_tool_xyz_12345"), 4)
            .unwrap_err();
        assert_matches!(err, Error::Spawn { .. });
    }

    #[tokio::test]
    async fn write_and_close_cleanly() {
        let mut enc = EncoderProcess::start(&sh("cat > /dev/null"), 16).unwrap();
        assert!(enc.pid().is_some());
        for _ in 0..10 {
            enc.write_frame(&[7u8; 16]).await.unwrap();
        }
        enc.close(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn wrong_length_rejected_before_write() {
        let mut enc = EncoderProcess::start(&sh("cat > /dev/null"), 16).unwrap();
        let err = enc.write_frame(&[0u8; 15]).await.unwrap_err();
        assert_matches!(
            err,
            Error::FrameSize {
                expected: 16,
                actual: 15
            }
        );
        // The rejected frame did not poison the stream.
        enc.write_frame(&[0u8; 16]).await.unwrap();
        enc.close(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_on_close() {
        let mut enc = EncoderProcess::start(&sh("cat > /dev/null; exit 3"), 4).unwrap();
        let err = enc.close(Duration::from_secs(5)).await.unwrap_err();
        assert_matches!(err, Error::EncoderExit { status } if status.code() == Some(3));
        assert!(err.is_fatal_to_run());
    }

    #[tokio::test]
    async fn write_after_exit_is_encoder_gone() {
        let mut enc = EncoderProcess::start(&sh("exit 0"), 4096).unwrap();
        for _ in 0..100 {
            if enc.try_status().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let err = enc.write_frame(&[0u8; 4096]).await.unwrap_err();
        assert_matches!(err, Error::EncoderGone { .. });
    }

    #[tokio::test]
    async fn hung_child_is_killed_after_grace() {
        let mut enc = EncoderProcess::start(&sh("exec sleep 30"), 4).unwrap();
        let started = std::time::Instant::now();
        let err = enc.close(Duration::from_millis(200)).await.unwrap_err();
        assert_matches!(err, Error::Timeout { .. });
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(enc.try_status().unwrap().is_some());
    }

    #[tokio::test]
    async fn detached_input_round_trip() {
        let mut enc = EncoderProcess::start(&sh("cat > /dev/null"), 8).unwrap();
        let mut input = enc.take_input().unwrap();
        assert_matches!(
            enc.write_frame(&[0u8; 8]).await,
            Err(Error::Internal(_))
        );
        input.write_frame(&[1u8; 8]).await.unwrap();
        enc.restore_input(input);
        enc.write_frame(&[2u8; 8]).await.unwrap();
        enc.close(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn kill_is_idempotent() {
        let mut enc = EncoderProcess::start(&sh("exec sleep 30"), 4).unwrap();
        enc.kill().await.unwrap();
        enc.kill().await.unwrap();
        assert!(enc.try_status().unwrap().is_some());
    }
}
