use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VeloraError};

fn default_audio_quality() -> String {
    "192K".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub download: DownloadConfig,
    pub fetch: FetchConfig,
    pub transcode: TranscodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Base directory all artifacts are written under
    pub base_dir: PathBuf,
    /// Container used when a video request does not name one
    pub video_format: String,
    /// Container used when an audio request does not name one
    pub audio_format: String,
    /// Resolution used when a request does not name one
    pub video_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Path to the fetch tool binary (e.g. yt-dlp); probed against
    /// fallback locations at startup when not directly runnable
    pub binary_path: String,
    /// Audio quality tier passed to the fetch tool's extraction mode
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Path to the transcoder binary (e.g. ffmpeg)
    pub binary_path: String,
    /// Path to the stream prober binary (e.g. ffprobe)
    pub probe_path: String,
    /// Video codec for re-encoding stages
    pub video_codec: String,
    /// Encode quality label: low, medium, high, ultra
    pub quality: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig {
                base_dir: default_download_dir(),
                video_format: "mp4".to_string(),
                audio_format: "mp3".to_string(),
                video_quality: "1080p".to_string(),
            },
            fetch: FetchConfig {
                binary_path: "yt-dlp".to_string(),
                audio_quality: default_audio_quality(),
            },
            transcode: TranscodeConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                video_codec: "libx264".to_string(),
                quality: "medium".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VeloraError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| VeloraError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VeloraError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| VeloraError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Default download directory: ~/Downloads/Velora
fn default_download_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Downloads").join("Velora")
}
