use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::ArtifactManager;
use crate::config::FetchConfig;
use crate::error::VeloraError;
use crate::fetch::{FetchCommandBuilder, FetcherTrait};
use crate::outcome::{classify_stderr, ErrorKind};
use crate::plan::{AcquisitionPlan, Strategy};

/// A successfully acquired artifact plus the strategy that produced it.
/// The strategy's flags tell the pipeline which post-hoc work is owed.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub path: PathBuf,
    pub strategy: Strategy,
}

/// Walks an acquisition plan's strategies in order until one produces an
/// artifact or the plan is exhausted.
pub struct AcquisitionExecutor<'a> {
    fetcher: &'a dyn FetcherTrait,
    artifacts: &'a ArtifactManager,
    command_builder: FetchCommandBuilder,
    audio_quality: String,
}

impl<'a> AcquisitionExecutor<'a> {
    pub fn new(
        fetcher: &'a dyn FetcherTrait,
        artifacts: &'a ArtifactManager,
        fetch_config: &FetchConfig,
    ) -> Self {
        Self {
            fetcher,
            artifacts,
            command_builder: FetchCommandBuilder::new(&fetch_config.binary_path),
            audio_quality: fetch_config.audio_quality.clone(),
        }
    }

    /// Try each strategy in order. An `InvalidUrl` classification stops the
    /// walk immediately; any other failure moves on to the next strategy.
    /// On every failure path the strategy's provisional files are swept.
    pub async fn execute(
        &self,
        plan: &AcquisitionPlan,
        url: &str,
    ) -> Result<Acquired, ErrorKind> {
        let total = plan.strategies.len();
        let mut last_failure: Option<ErrorKind> = None;

        for (index, strategy) in plan.strategies.iter().enumerate() {
            let prefix = ArtifactManager::strategy_prefix(index);
            // Stale partials from a previous run of this strategy slot must
            // not win the newest-file lookup
            self.artifacts.sweep_prefix(&prefix).map_err(io_failure)?;

            let template = self.artifacts.output_template(&prefix);
            let extract = strategy
                .extract_audio
                .then(|| (plan.audio_format.fetch_name(), self.audio_quality.as_str()));
            let command = self.command_builder.download(
                url,
                &template,
                strategy.selector.as_deref(),
                extract,
                &strategy.label,
            );

            info!(
                "Acquisition attempt {}/{}: {}",
                index + 1,
                total,
                strategy.label
            );

            let output = match self.fetcher.run(command).await {
                Ok(output) => output,
                Err(e) => {
                    let _ = self.artifacts.sweep_prefix(&prefix);
                    return Err(tool_failure(e));
                }
            };

            if output.success {
                match self.artifacts.newest_with_prefix(&prefix).map_err(io_failure)? {
                    Some(path) => {
                        let final_path =
                            self.artifacts.promote(&path, &prefix).map_err(io_failure)?;
                        info!("Acquired: {}", final_path.display());
                        return Ok(Acquired {
                            path: final_path,
                            strategy: strategy.clone(),
                        });
                    }
                    None => {
                        warn!(
                            "Strategy '{}' exited cleanly but produced no file",
                            strategy.label
                        );
                        last_failure = Some(ErrorKind::Unknown(
                            "fetch tool produced no output file".to_string(),
                        ));
                        continue;
                    }
                }
            }

            let kind = classify_stderr(&output.stderr);
            self.artifacts.sweep_prefix(&prefix).map_err(io_failure)?;

            if kind == ErrorKind::InvalidUrl {
                return Err(kind);
            }

            warn!(
                "Strategy '{}' failed ({}); {} remaining",
                strategy.label,
                kind.user_message(),
                total - index - 1
            );
            last_failure = Some(kind);
        }

        Err(last_failure
            .unwrap_or_else(|| ErrorKind::Unknown("acquisition plan was empty".to_string())))
    }
}

fn io_failure(e: VeloraError) -> ErrorKind {
    ErrorKind::Unknown(e.to_string())
}

fn tool_failure(e: VeloraError) -> ErrorKind {
    match e {
        VeloraError::ToolUnavailable(tool) => ErrorKind::ToolUnavailable(tool),
        VeloraError::Fetch(msg) => ErrorKind::ToolUnavailable(msg),
        other => ErrorKind::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchCommand, FetchOutput, MockFetcherTrait};
    use crate::platform::classify;
    use crate::plan::plan;
    use crate::request::{DownloadRequest, Resolution, VideoContainer};
    use std::fs;
    use std::path::Path;

    fn video_plan(url: &str, resolution: Resolution) -> AcquisitionPlan {
        let request = DownloadRequest::video(url, resolution, true, VideoContainer::Mp4);
        plan(&request, &classify(url))
    }

    /// Pull the output template out of a built command and write a fake
    /// artifact where the tool would have.
    fn write_fake_artifact(command: &FetchCommand, title: &str, ext: &str) {
        let template_pos = command.args.iter().position(|a| a == "-o").unwrap() + 1;
        let produced = command.args[template_pos]
            .replace("%(title)s", title)
            .replace("%(ext)s", ext);
        fs::write(produced, b"media").unwrap();
    }

    fn provisional_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".velora-"))
            .count()
    }

    #[tokio::test]
    async fn test_first_strategy_success_promotes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactManager::new(dir.path());
        let url = "https://www.youtube.com/watch?v=x";

        let mut fetcher = MockFetcherTrait::new();
        fetcher.expect_run().times(1).returning(|command| {
            write_fake_artifact(&command, "My Clip", "mp4");
            Ok(FetchOutput {
                success: true,
                stderr: String::new(),
            })
        });

        let config = FetchConfig {
            binary_path: "yt-dlp".to_string(),
            audio_quality: "192K".to_string(),
        };
        let executor = AcquisitionExecutor::new(&fetcher, &artifacts, &config);
        let acquired = executor
            .execute(&video_plan(url, Resolution::Best), url)
            .await
            .unwrap();

        assert_eq!(acquired.path.file_name().unwrap(), "My Clip.mp4");
        assert!(acquired.path.exists());
        assert_eq!(provisional_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_exhausted_plan_leaves_no_provisional_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactManager::new(dir.path());
        let url = "https://www.youtube.com/watch?v=x";

        let mut fetcher = MockFetcherTrait::new();
        fetcher.expect_run().times(2).returning(|command| {
            // Simulate a partial file left behind by the failed attempt
            write_fake_artifact(&command, "partial", "part");
            Ok(FetchOutput {
                success: false,
                stderr: "ERROR: fragment 1 not downloadable".to_string(),
            })
        });

        let config = FetchConfig {
            binary_path: "yt-dlp".to_string(),
            audio_quality: "192K".to_string(),
        };
        let executor = AcquisitionExecutor::new(&fetcher, &artifacts, &config);
        let result = executor
            .execute(&video_plan(url, Resolution::Tier(720)), url)
            .await;

        assert!(matches!(result, Err(ErrorKind::Unknown(_))));
        assert_eq!(provisional_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_stops_the_strategy_walk() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactManager::new(dir.path());
        let url = "https://www.youtube.com/watch?v=x";

        let mut fetcher = MockFetcherTrait::new();
        fetcher.expect_run().times(1).returning(|_| {
            Ok(FetchOutput {
                success: false,
                stderr: "ERROR: 'x' is not a valid URL".to_string(),
            })
        });

        let config = FetchConfig {
            binary_path: "yt-dlp".to_string(),
            audio_quality: "192K".to_string(),
        };
        let executor = AcquisitionExecutor::new(&fetcher, &artifacts, &config);
        let result = executor
            .execute(&video_plan(url, Resolution::Tier(720)), url)
            .await;

        assert_eq!(result.unwrap_err(), ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn test_fallback_strategy_carries_its_own_flags() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactManager::new(dir.path());
        let url = "https://www.youtube.com/watch?v=x";

        let mut fetcher = MockFetcherTrait::new();
        let mut attempt = 0;
        fetcher.expect_run().times(2).returning(move |command| {
            attempt += 1;
            if attempt == 1 {
                Ok(FetchOutput {
                    success: false,
                    stderr: "ERROR: Requested format is not available".to_string(),
                })
            } else {
                write_fake_artifact(&command, "Clip", "webm");
                Ok(FetchOutput {
                    success: true,
                    stderr: String::new(),
                })
            }
        });

        let config = FetchConfig {
            binary_path: "yt-dlp".to_string(),
            audio_quality: "192K".to_string(),
        };
        let executor = AcquisitionExecutor::new(&fetcher, &artifacts, &config);
        let acquired = executor
            .execute(&video_plan(url, Resolution::Tier(480)), url)
            .await
            .unwrap();

        // The unbounded fallback owes the pipeline a downscale
        assert!(acquired.strategy.downscale_after);
        assert_eq!(acquired.path.file_name().unwrap(), "Clip.webm");
    }
}
