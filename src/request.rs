use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VeloraError;

/// Height tiers the engine understands, plus "best".
const HEIGHT_TIERS: &[u32] = &[2160, 1440, 1080, 720, 480, 360, 240, 144];

/// Requested target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// No height bound; take the best the source offers
    Best,
    /// Bounded by a height tier (1080, 720, ...)
    Tier(u32),
}

impl Resolution {
    pub fn height(&self) -> Option<u32> {
        match self {
            Resolution::Best => None,
            Resolution::Tier(h) => Some(*h),
        }
    }
}

impl FromStr for Resolution {
    type Err = VeloraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "best" {
            return Ok(Resolution::Best);
        }
        let height: u32 = s
            .strip_suffix('p')
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| {
                VeloraError::Config(format!(
                    "Invalid resolution '{}'. Use 'best' or a tier like 1080p",
                    s
                ))
            })?;
        if !HEIGHT_TIERS.contains(&height) {
            return Err(VeloraError::Config(format!(
                "Unsupported resolution tier '{}p'. Known tiers: {}",
                height,
                HEIGHT_TIERS
                    .iter()
                    .map(|h| format!("{}p", h))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(Resolution::Tier(height))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Best => write!(f, "best"),
            Resolution::Tier(h) => write!(f, "{}p", h),
        }
    }
}

/// Final video container for a job. Conversion into it is always handled by
/// the post-processing pipeline, never by the fetch tool's remux flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoContainer {
    Mp4,
    Mkv,
    Webm,
    Mov,
    Avi,
}

impl VideoContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Mp4 => "mp4",
            VideoContainer::Mkv => "mkv",
            VideoContainer::Webm => "webm",
            VideoContainer::Mov => "mov",
            VideoContainer::Avi => "avi",
        }
    }
}

impl FromStr for VideoContainer {
    type Err = VeloraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(VideoContainer::Mp4),
            "mkv" => Ok(VideoContainer::Mkv),
            "webm" => Ok(VideoContainer::Webm),
            "mov" => Ok(VideoContainer::Mov),
            "avi" => Ok(VideoContainer::Avi),
            other => Err(VeloraError::UnsupportedFormat(format!(
                "Unknown video container '{}'. Supported: mp4, mkv, webm, mov, avi",
                other
            ))),
        }
    }
}

impl fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Audio container for audio-only jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Opus,
    Flac,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
        }
    }

    /// Name understood by the fetch tool's --audio-format flag
    pub fn fetch_name(&self) -> &'static str {
        self.extension()
    }
}

impl FromStr for AudioFormat {
    type Err = VeloraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "m4a" => Ok(AudioFormat::M4a),
            "opus" => Ok(AudioFormat::Opus),
            "flac" => Ok(AudioFormat::Flac),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(VeloraError::UnsupportedFormat(format!(
                "Unknown audio format '{}'. Supported: mp3, m4a, opus, flac, wav",
                other
            ))),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Immutable description of one download job.
///
/// When `audio_only` is set the video fields are inert: planning
/// short-circuits straight to audio extraction and `resolution` /
/// `output_format` are never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub resolution: Resolution,
    pub include_audio: bool,
    pub output_format: VideoContainer,
    pub audio_only: bool,
    pub audio_format: AudioFormat,
}

impl DownloadRequest {
    pub fn video(
        url: impl Into<String>,
        resolution: Resolution,
        include_audio: bool,
        output_format: VideoContainer,
    ) -> Self {
        Self {
            url: url.into(),
            resolution,
            include_audio,
            output_format,
            audio_only: false,
            audio_format: AudioFormat::Mp3,
        }
    }

    pub fn audio(url: impl Into<String>, audio_format: AudioFormat) -> Self {
        Self {
            url: url.into(),
            resolution: Resolution::Best,
            include_audio: true,
            output_format: VideoContainer::Mp4,
            audio_only: true,
            audio_format,
        }
    }
}
