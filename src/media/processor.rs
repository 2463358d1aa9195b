use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::{run_probe, ProbeReport, TranscodeCommandBuilder, TranscoderTrait};
use crate::config::TranscodeConfig;
use crate::error::{Result, VeloraError};
use crate::request::{AudioFormat, VideoContainer};

/// Codec pairs known to be compatible with each target container, used by
/// the re-encode fallback when a plain stream copy is refused.
const CONTAINER_CODECS: &[(VideoContainer, &str, &str)] = &[
    (VideoContainer::Mp4, "libx264", "aac"),
    (VideoContainer::Mov, "libx264", "aac"),
    (VideoContainer::Mkv, "libx264", "aac"),
    (VideoContainer::Webm, "libvpx-vp9", "libopus"),
    (VideoContainer::Avi, "mpeg4", "libmp3lame"),
];

pub fn codecs_for(container: VideoContainer) -> (&'static str, &'static str) {
    CONTAINER_CODECS
        .iter()
        .find(|(c, _, _)| *c == container)
        .map(|(_, v, a)| (*v, *a))
        .expect("every container has a codec pair")
}

/// Audio codec (and bitrate, for lossy targets) per extraction format.
fn audio_codec_for(format: AudioFormat) -> (&'static str, Option<&'static str>) {
    match format {
        AudioFormat::Mp3 => ("libmp3lame", Some("192k")),
        AudioFormat::M4a => ("aac", Some("192k")),
        AudioFormat::Opus => ("libopus", Some("128k")),
        AudioFormat::Flac => ("flac", None),
        AudioFormat::Wav => ("pcm_s16le", None),
    }
}

/// crf/preset pairs per quality label, per encoder family.
fn encode_options(video_codec: &str, quality: &str) -> (u32, &'static str) {
    let table: &[(&str, u32, &'static str)] = if video_codec == "libx265" {
        &[
            ("low", 32, "fast"),
            ("medium", 28, "medium"),
            ("high", 23, "slow"),
            ("ultra", 18, "veryslow"),
        ]
    } else {
        &[
            ("low", 28, "fast"),
            ("medium", 23, "medium"),
            ("high", 18, "slow"),
            ("ultra", 15, "veryslow"),
        ]
    };

    table
        .iter()
        .find(|(label, _, _)| *label == quality)
        .or_else(|| table.iter().find(|(label, _, _)| *label == "medium"))
        .map(|(_, crf, preset)| (*crf, *preset))
        .expect("quality table always has a medium row")
}

/// Concrete transcoder implementation (ffmpeg/ffprobe-based)
pub struct TranscoderImpl {
    config: TranscodeConfig,
    command_builder: TranscodeCommandBuilder,
}

impl TranscoderImpl {
    pub fn new(config: TranscodeConfig) -> Self {
        let command_builder = TranscodeCommandBuilder::new(&config.binary_path);
        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl TranscoderTrait for TranscoderImpl {
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        run_probe(&self.config.probe_path, path)
    }

    async fn strip_audio(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Stripping audio: {}", input.display());
        self.command_builder.strip_audio(input, output).execute()
    }

    async fn downscale(&self, input: &Path, output: &Path, height: u32) -> Result<()> {
        info!("Downscaling {} to {}p", input.display(), height);
        let (crf, preset) = encode_options(&self.config.video_codec, &self.config.quality);
        self.command_builder
            .downscale(
                input,
                output,
                height,
                &self.config.video_codec,
                crf,
                preset,
            )
            .execute()
    }

    async fn remux(&self, input: &Path, output: &Path) -> Result<()> {
        info!(
            "Remuxing {} -> {}",
            input.display(),
            output.display()
        );
        self.command_builder.remux(input, output).execute()
    }

    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        container: VideoContainer,
    ) -> Result<()> {
        let (video_codec, audio_codec) = codecs_for(container);
        info!(
            "Re-encoding {} for {} ({}/{})",
            input.display(),
            container,
            video_codec,
            audio_codec
        );
        let (crf, preset) = encode_options(video_codec, &self.config.quality);
        self.command_builder
            .reencode(input, output, video_codec, audio_codec, crf, preset)
            .execute()
    }

    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<()> {
        let (codec, bitrate) = audio_codec_for(format);
        info!(
            "Extracting audio from {} as {}",
            input.display(),
            format
        );
        self.command_builder
            .extract_audio(input, output, codec, bitrate)
            .execute()
    }

    fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| {
                VeloraError::ToolUnavailable(format!("{}: {}", self.config.binary_path, e))
            })?;

        if output.status.success() {
            debug!("Transcoder is available: {}", self.config.binary_path);
            Ok(())
        } else {
            Err(VeloraError::ToolUnavailable(format!(
                "{}: version check failed",
                self.config.binary_path
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_container_has_a_codec_pair() {
        for container in [
            VideoContainer::Mp4,
            VideoContainer::Mkv,
            VideoContainer::Webm,
            VideoContainer::Mov,
            VideoContainer::Avi,
        ] {
            let (video, audio) = codecs_for(container);
            assert!(!video.is_empty());
            assert!(!audio.is_empty());
        }
    }

    #[test]
    fn test_webm_avoids_h264() {
        let (video, audio) = codecs_for(VideoContainer::Webm);
        assert_eq!(video, "libvpx-vp9");
        assert_eq!(audio, "libopus");
    }

    #[test]
    fn test_encode_options_vary_by_quality() {
        assert_eq!(encode_options("libx264", "medium"), (23, "medium"));
        assert_eq!(encode_options("libx264", "ultra"), (15, "veryslow"));
        assert_eq!(encode_options("libx265", "medium"), (28, "medium"));
        // Unknown labels fall back to medium
        assert_eq!(encode_options("libx264", "turbo"), (23, "medium"));
    }

    #[test]
    fn test_lossless_extraction_has_no_bitrate() {
        assert_eq!(audio_codec_for(AudioFormat::Flac).1, None);
        assert_eq!(audio_codec_for(AudioFormat::Mp3).1, Some("192k"));
    }
}
