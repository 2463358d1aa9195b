use std::process::{Command, Stdio};
use tracing::debug;

use super::FetchOutput;
use crate::error::{Result, VeloraError};

/// One fetch-tool invocation under construction.
#[derive(Debug, Clone)]
pub struct FetchCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl FetchCommand {
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

    /// Restrict a playlist URL to its single item
    pub fn no_playlist(self) -> Self {
        self.arg("--no-playlist")
    }

    /// Expand a playlist URL into all of its items
    pub fn yes_playlist(self) -> Self {
        self.arg("--yes-playlist")
    }

    /// Where and under what name the tool writes its output
    pub fn output_template<S: Into<String>>(self, template: S) -> Self {
        self.arg("-o").arg(template)
    }

    pub fn progress(self) -> Self {
        self.arg("--progress")
    }

    pub fn no_warnings(self) -> Self {
        self.arg("--no-warnings")
    }

    /// Stream selector expression
    pub fn format_selector<S: Into<String>>(self, selector: S) -> Self {
        self.arg("-f").arg(selector)
    }

    /// Switch the tool into audio extraction mode
    pub fn extract_audio<S1: Into<String>, S2: Into<String>>(
        self,
        format: S1,
        quality: S2,
    ) -> Self {
        self.arg("-x")
            .arg("--audio-format")
            .arg(format)
            .arg("--audio-quality")
            .arg(quality)
    }

    pub fn no_download(self) -> Self {
        self.arg("--no-download")
    }

    pub fn print_json(self) -> Self {
        self.arg("--print-json")
    }

    pub fn url<S: Into<String>>(self, url: S) -> Self {
        self.arg(url)
    }

    /// Execute, letting the tool's own progress rendering reach the terminal
    /// while stderr is captured for classification.
    pub fn execute(&self) -> Result<FetchOutput> {
        debug!("Executing fetch command: {} {:?}", self.binary_path, self.args);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| VeloraError::Fetch(format!("Failed to execute fetch tool: {}", e)))?;

        Ok(FetchOutput {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Execute with both streams captured; used for metadata queries where
    /// stdout is the payload.
    pub fn execute_captured(&self) -> Result<(FetchOutput, String)> {
        debug!("Executing fetch command: {} {:?}", self.binary_path, self.args);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .map_err(|e| VeloraError::Fetch(format!("Failed to execute fetch tool: {}", e)))?;

        Ok((
            FetchOutput {
                success: output.status.success(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            String::from_utf8_lossy(&output.stdout).to_string(),
        ))
    }
}

/// Builder for the fetch-tool invocations this engine issues
pub struct FetchCommandBuilder {
    binary_path: String,
}

impl FetchCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build a single-item download command. `selector` of None leaves the
    /// tool on its default stream choice; `extract` switches it to
    /// audio-extraction mode.
    pub fn download(
        &self,
        url: &str,
        output_template: &str,
        selector: Option<&str>,
        extract: Option<(&str, &str)>,
        label: &str,
    ) -> FetchCommand {
        let mut cmd = FetchCommand::new(&self.binary_path, format!("Fetch ({})", label))
            .no_playlist()
            .output_template(output_template)
            .progress()
            .no_warnings();

        if let Some(selector) = selector {
            cmd = cmd.format_selector(selector);
        }
        if let Some((format, quality)) = extract {
            cmd = cmd.extract_audio(format, quality);
        }

        cmd.url(url)
    }

    /// Build a metadata query command
    pub fn inspect(&self, url: &str) -> FetchCommand {
        FetchCommand::new(&self.binary_path, "Inspect")
            .no_download()
            .print_json()
            .no_warnings()
            .url(url)
    }

    /// Build a version health-check command
    pub fn version_check(&self) -> FetchCommand {
        FetchCommand::new(&self.binary_path, "Version check").arg("--version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_command_honors_invocation_contract() {
        let builder = FetchCommandBuilder::new("yt-dlp");
        let cmd = builder.download(
            "https://youtu.be/x",
            "/tmp/work/.velora-s0-%(title)s.%(ext)s",
            Some("bestvideo+bestaudio/best"),
            None,
            "best-pair",
        );

        assert_eq!(
            cmd.args,
            vec![
                "--no-playlist",
                "-o",
                "/tmp/work/.velora-s0-%(title)s.%(ext)s",
                "--progress",
                "--no-warnings",
                "-f",
                "bestvideo+bestaudio/best",
                "https://youtu.be/x",
            ]
        );
    }

    #[test]
    fn test_default_selector_omits_format_flag() {
        let builder = FetchCommandBuilder::new("yt-dlp");
        let cmd = builder.download(
            "https://youtu.be/x",
            "/tmp/t",
            None,
            Some(("mp3", "192K")),
            "audio-extract",
        );

        assert!(!cmd.args.contains(&"-f".to_string()));
        let extract_args: Vec<&str> = cmd.args.iter().map(|s| s.as_str()).collect();
        let x_pos = extract_args.iter().position(|a| *a == "-x").unwrap();
        assert_eq!(extract_args[x_pos + 1], "--audio-format");
        assert_eq!(extract_args[x_pos + 2], "mp3");
        assert_eq!(extract_args[x_pos + 4], "192K");
    }

    #[test]
    fn test_inspect_command_never_downloads() {
        let builder = FetchCommandBuilder::new("yt-dlp");
        let cmd = builder.inspect("https://youtu.be/x");
        assert!(cmd.args.contains(&"--no-download".to_string()));
        assert!(cmd.args.contains(&"--print-json".to_string()));
    }
}
