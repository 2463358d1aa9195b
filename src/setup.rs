use std::process::Command;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, VeloraError};

/// Locations probed for the fetch tool, after the configured path.
const FETCH_CANDIDATES: &[&str] = &[
    "yt-dlp",
    "./yt-dlp",
    "/usr/local/bin/yt-dlp",
    "/usr/bin/yt-dlp",
    "yt-dlp.exe",
];

const TRANSCODE_CANDIDATES: &[&str] = &[
    "ffmpeg",
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "ffmpeg.exe",
];

const PROBE_CANDIDATES: &[&str] = &[
    "ffprobe",
    "/usr/bin/ffprobe",
    "/usr/local/bin/ffprobe",
    "ffprobe.exe",
];

/// Resolves the external binaries once at process start and records the
/// working paths back into the configuration.
pub struct SetupManager;

impl SetupManager {
    pub fn new() -> Self {
        Self
    }

    /// Probe for the external tools. A missing fetch tool is a fatal
    /// startup error; a missing transcoder or prober only disables
    /// post-processing, which the workflow surfaces as a warning.
    pub fn initialize(&self, config: &mut Config) -> Result<()> {
        info!("Resolving external tools...");

        match self.resolve(&config.fetch.binary_path, FETCH_CANDIDATES, "--version") {
            Some(path) => {
                info!("Fetch tool: {}", path);
                config.fetch.binary_path = path;
            }
            None => {
                return Err(VeloraError::ToolUnavailable(
                    "fetch tool (yt-dlp). Install it: pip install yt-dlp \
                     or see https://github.com/yt-dlp/yt-dlp"
                        .to_string(),
                ));
            }
        }

        match self.resolve(&config.transcode.binary_path, TRANSCODE_CANDIDATES, "-version") {
            Some(path) => {
                info!("Transcoder: {}", path);
                config.transcode.binary_path = path;
            }
            None => warn!(
                "Transcoder not found; downloads will be kept as acquired. \
                 Install ffmpeg: https://ffmpeg.org/download.html"
            ),
        }

        match self.resolve(&config.transcode.probe_path, PROBE_CANDIDATES, "-version") {
            Some(path) => {
                info!("Prober: {}", path);
                config.transcode.probe_path = path;
            }
            None => warn!("Prober not found; post-processing stages will be skipped"),
        }

        Ok(())
    }

    /// Try the configured path first, then the fixed candidate list; the
    /// first binary that passes a version health check wins.
    fn resolve(&self, configured: &str, candidates: &[&str], version_flag: &str) -> Option<String> {
        std::iter::once(configured)
            .chain(candidates.iter().copied())
            .find(|path| health_check(path, version_flag))
            .map(|path| path.to_string())
    }
}

impl Default for SetupManager {
    fn default() -> Self {
        Self::new()
    }
}

fn health_check(path: &str, version_flag: &str) -> bool {
    Command::new(path)
        .arg(version_flag)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
