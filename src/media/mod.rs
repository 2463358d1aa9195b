// Transcoder abstraction
//
// Post-processing runs through an ffmpeg-compatible transcoder and an
// ffprobe-compatible stream prober:
// - Commands: argument builders for the operations the pipeline needs
// - Probe: stream/format report parsing
// - Processor: concrete implementation bound to resolved binary paths

pub mod commands;
pub mod probe;
pub mod processor;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::path::Path;

pub use commands::*;
pub use probe::*;
pub use processor::*;

use crate::error::Result;
use crate::request::{AudioFormat, VideoContainer};

/// Main trait for transcoder operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TranscoderTrait: Send + Sync {
    /// Probe a file's streams and container
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;

    /// Drop the audio track, stream-copying video
    async fn strip_audio(&self, input: &Path, output: &Path) -> Result<()>;

    /// Re-encode video down to `height`, preserving aspect ratio and
    /// stream-copying audio
    async fn downscale(&self, input: &Path, output: &Path, height: u32) -> Result<()>;

    /// Stream-copy both tracks into the container implied by `output`
    async fn remux(&self, input: &Path, output: &Path) -> Result<()>;

    /// Re-encode both tracks into codecs compatible with `container`
    async fn reencode(&self, input: &Path, output: &Path, container: VideoContainer)
        -> Result<()>;

    /// Extract the audio track into `format`
    async fn extract_audio(&self, input: &Path, output: &Path, format: AudioFormat)
        -> Result<()>;

    /// Check if the transcoder responds to a version probe
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating transcoder instances
pub struct TranscoderFactory;

impl TranscoderFactory {
    /// Create the default transcoder bound to resolved binary paths
    pub fn create_transcoder(config: crate::config::TranscodeConfig) -> Box<dyn TranscoderTrait> {
        Box::new(processor::TranscoderImpl::new(config))
    }
}
