use async_trait::async_trait;
use std::process::Command;
use tracing::{debug, info};

use super::{FetchCommand, FetchCommandBuilder, FetchOutput, FetcherTrait, MediaInfo};
use crate::error::{Result, VeloraError};
use crate::outcome::classify_stderr;

/// Concrete fetcher bound to a resolved yt-dlp-compatible binary.
pub struct FetcherImpl {
    binary_path: String,
    command_builder: FetchCommandBuilder,
}

impl FetcherImpl {
    pub fn new(binary_path: String) -> Self {
        let command_builder = FetchCommandBuilder::new(&binary_path);
        Self {
            binary_path,
            command_builder,
        }
    }
}

#[async_trait]
impl FetcherTrait for FetcherImpl {
    async fn run(&self, command: FetchCommand) -> Result<FetchOutput> {
        debug!("Running fetch: {}", command.description);
        command.execute()
    }

    async fn inspect(&self, url: &str) -> Result<MediaInfo> {
        let command = self.command_builder.inspect(url);
        let (output, stdout) = command.execute_captured()?;

        if !output.success {
            let kind = classify_stderr(&output.stderr);
            return Err(VeloraError::Fetch(kind.user_message()));
        }

        let info: MediaInfo = serde_json::from_str(stdout.trim())
            .map_err(|e| VeloraError::Fetch(format!("Failed to parse item metadata: {}", e)))?;
        Ok(info)
    }

    fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .map_err(|e| VeloraError::ToolUnavailable(format!("{}: {}", self.binary_path, e)))?;

        if output.status.success() {
            info!("Fetch tool is available: {}", self.binary_path);
            Ok(())
        } else {
            Err(VeloraError::ToolUnavailable(format!(
                "{}: version check failed",
                self.binary_path
            )))
        }
    }
}
