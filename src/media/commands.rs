use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{Result, VeloraError};

/// One transcoder invocation under construction.
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl TranscodeCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn copy_streams(self) -> Self {
        self.arg("-c").arg("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command. Unlike the fetch tool, a non-zero exit here is a
    /// stage failure and surfaces as an error with the stderr attached.
    pub fn execute(&self) -> Result<()> {
        debug!(
            "Executing transcode command: {} {:?}",
            self.binary_path, self.args
        );

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .map_err(|e| VeloraError::Transcode(format!("Failed to execute transcoder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VeloraError::Transcode(format!(
                "{} failed: {}",
                self.description, stderr
            )));
        }

        Ok(())
    }
}

/// Builder for the transcoder invocations the pipeline issues
pub struct TranscodeCommandBuilder {
    binary_path: String,
}

impl TranscodeCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Drop audio, keep the video stream untouched
    pub fn strip_audio<P: AsRef<Path>>(&self, input: P, output: P) -> TranscodeCommand {
        TranscodeCommand::new(&self.binary_path, "Audio strip")
            .overwrite()
            .input(input)
            .copy_video()
            .no_audio()
            .output(output)
    }

    /// Scale to a target height; width follows the aspect ratio and is kept
    /// even for encoder compatibility. Audio is stream-copied.
    pub fn downscale<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        height: u32,
        video_codec: &str,
        crf: u32,
        preset: &str,
    ) -> TranscodeCommand {
        TranscodeCommand::new(&self.binary_path, format!("Downscale to {}p", height))
            .overwrite()
            .input(input)
            .video_filter(format!("scale=-2:{}", height))
            .video_codec(video_codec)
            .arg("-crf")
            .arg(crf.to_string())
            .arg("-preset")
            .arg(preset)
            .copy_audio()
            .output(output)
    }

    /// Stream-copy into the container implied by the output extension
    pub fn remux<P: AsRef<Path>>(&self, input: P, output: P) -> TranscodeCommand {
        TranscodeCommand::new(&self.binary_path, "Container remux")
            .overwrite()
            .input(input)
            .copy_streams()
            .output(output)
    }

    /// Full re-encode into an explicit codec pair
    pub fn reencode<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        video_codec: &str,
        audio_codec: &str,
        crf: u32,
        preset: &str,
    ) -> TranscodeCommand {
        TranscodeCommand::new(
            &self.binary_path,
            format!("Re-encode ({}/{})", video_codec, audio_codec),
        )
        .overwrite()
        .input(input)
        .video_codec(video_codec)
        .arg("-crf")
        .arg(crf.to_string())
        .arg("-preset")
        .arg(preset)
        .audio_codec(audio_codec)
        .output(output)
    }

    /// Pull the audio track out into a standalone file
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        input: P,
        output: P,
        audio_codec: &str,
        bitrate: Option<&str>,
    ) -> TranscodeCommand {
        let mut cmd = TranscodeCommand::new(&self.binary_path, "Audio extraction")
            .overwrite()
            .input(input)
            .no_video()
            .audio_codec(audio_codec);
        if let Some(bitrate) = bitrate {
            cmd = cmd.audio_bitrate(bitrate);
        }
        cmd.output(output)
    }

    /// Build a version health-check command
    pub fn version_check(&self) -> TranscodeCommand {
        TranscodeCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
