//! External tool detection.
//!
//! The [`ToolRegistry`] discovers and caches the location of the encoder
//! executable and reports its version for diagnostics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

const FFMPEG: &str = "ffmpeg";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover ffmpeg.
    ///
    /// If `ffmpeg_override` is supplied **and** exists it is used directly;
    /// otherwise [`which::which`] searches `PATH`. A tool that is not found
    /// is omitted from the registry.
    pub fn discover(ffmpeg_override: Option<&Path>) -> Self {
        let resolved = match ffmpeg_override {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => {
                tracing::warn!(
                    tool = FFMPEG,
                    "Configured path {} does not exist; searching PATH",
                    p.display()
                );
                which::which(FFMPEG).ok()
            }
            None => which::which(FFMPEG).ok(),
        };

        let mut tools = HashMap::new();
        if let Some(path) = resolved {
            tracing::debug!(tool = FFMPEG, path = %path.display(), "Tool found");
            tools.insert(FFMPEG.to_string(), path);
        }

        Self { tools }
    }

    /// Return the path for the given tool, or [`fc_core::Error::Spawn`] if it
    /// was not found during discovery.
    pub fn require(&self, name: &str) -> fc_core::Result<&Path> {
        self.tools.get(name).map(PathBuf::as_path).ok_or_else(|| {
            fc_core::Error::spawn(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
