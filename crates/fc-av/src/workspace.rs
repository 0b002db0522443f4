//! Working directory management.
//!
//! A [`Workspace`] is the private temporary directory one pipeline run hands
//! to its encoder. Only the encoder writes into it; the origin server and the
//! readiness probe only read.

use std::path::{Path, PathBuf};

use fc_core::config::PLAYLIST_NAME;
use tempfile::TempDir;

/// Prefix of every working directory created by framecast.
const DIR_PREFIX: &str = "framecast-";

/// Exclusive temporary directory for one pipeline run.
///
/// Dropping a workspace removes the directory; [`Workspace::remove`] does the
/// same but reports failures.
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under the system temp dir.
    pub fn create() -> fc_core::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh directory under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> fc_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| fc_core::Error::WorkingDir { source })?;

        tracing::debug!(dir = %temp_dir.path().display(), "Working directory created");
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where the encoder writes its playlist.
    pub fn playlist_path(&self) -> PathBuf {
        self.temp_dir.path().join(PLAYLIST_NAME)
    }

    /// Delete the directory and everything in it.
    pub fn remove(self) -> fc_core::Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close()?;
        tracing::debug!(dir = %path.display(), "Working directory removed");
        Ok(())
    }
}
