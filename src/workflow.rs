use chrono::{DateTime, Local};
use std::path::Path;
use tracing::{info, warn};

use crate::acquire::AcquisitionExecutor;
use crate::artifact::{ArtifactManager, CleanupGuard};
use crate::config::Config;
use crate::error::{Result, VeloraError};
use crate::fetch::{FetcherFactory, FetcherTrait, MediaInfo};
use crate::media::{TranscoderFactory, TranscoderTrait};
use crate::outcome::{BatchOutcome, ErrorKind, JobOutcome};
use crate::pipeline::PostProcessor;
use crate::plan;
use crate::platform::{self, Platform};
use crate::request::DownloadRequest;

pub struct Workflow {
    config: Config,
    fetcher: Box<dyn FetcherTrait>,
    transcoder: Option<Box<dyn TranscoderTrait>>,
}

impl Workflow {
    /// Wire up the external collaborators. A missing fetch tool is fatal; a
    /// missing transcoder degrades the engine to acquisition-only.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = FetcherFactory::create_fetcher(config.fetch.binary_path.clone());
        fetcher.check_availability()?;

        let transcoder = TranscoderFactory::create_transcoder(config.transcode.clone());
        let transcoder = match transcoder.check_availability() {
            Ok(()) => Some(transcoder),
            Err(e) => {
                warn!("Post-processing disabled: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            fetcher,
            transcoder,
        })
    }

    /// Construct from pre-built collaborators. The mock seam for tests.
    pub fn with_components(
        config: Config,
        fetcher: Box<dyn FetcherTrait>,
        transcoder: Option<Box<dyn TranscoderTrait>>,
    ) -> Self {
        Self {
            config,
            fetcher,
            transcoder,
        }
    }

    /// Run one download job end to end: validate, plan, acquire,
    /// post-process. Acquisition failures abort the job; post-processing
    /// failures degrade it.
    pub async fn run_single(&self, request: &DownloadRequest) -> Result<JobOutcome> {
        self.run_into(request, &self.config.download.base_dir).await
    }

    /// Run each entry of a batch through the single-item flow, sequentially,
    /// into one timestamped subdirectory. One entry's failure never aborts
    /// the batch.
    pub async fn run_batch(
        &self,
        urls: &[String],
        template: &DownloadRequest,
    ) -> Result<BatchOutcome> {
        let batch_dir = self
            .config
            .download
            .base_dir
            .join(batch_dir_name(&Local::now()));
        info!("Batch of {} item(s) into {}", urls.len(), batch_dir.display());

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let mut request = template.clone();
            request.url = url.clone();

            let outcome = match self.run_into(&request, &batch_dir).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Batch item {} errored: {}", url, e);
                    JobOutcome::failed(ErrorKind::Unknown(e.to_string()))
                }
            };

            if outcome.success {
                info!("Batch item done: {}", url);
            } else {
                warn!("Batch item failed: {}", url);
            }
            outcomes.push((url.clone(), outcome));
        }

        Ok(BatchOutcome {
            dir: batch_dir,
            outcomes,
        })
    }

    async fn run_into(&self, request: &DownloadRequest, dir: &Path) -> Result<JobOutcome> {
        if !platform::is_valid_url(&request.url) {
            return Ok(JobOutcome::failed(ErrorKind::InvalidUrl));
        }

        let profile = platform::classify(&request.url);
        info!(
            "Platform: {} (native height selectors: {})",
            profile.platform, profile.native_height_selectors
        );
        let plan = plan::plan(request, &profile);

        let artifacts = ArtifactManager::new(dir);
        artifacts.prepare()?;
        let mut guard = CleanupGuard::new(artifacts.clone());

        let executor = AcquisitionExecutor::new(self.fetcher.as_ref(), &artifacts, &self.config.fetch);
        let acquired = match executor.execute(&plan, &request.url).await {
            Ok(acquired) => acquired,
            Err(kind) => return Ok(JobOutcome::failed(kind)),
        };

        let processor = PostProcessor::new(self.transcoder.as_deref(), &artifacts);
        let (final_path, stages) = processor.run(&acquired, request, &plan).await;

        artifacts.sweep_all_provisional()?;
        guard.disarm();

        let outcome = JobOutcome::succeeded(final_path, stages);
        for stage in outcome.degraded_stages() {
            warn!("Optional stage {} failed; kept the best prior artifact", stage);
        }
        Ok(outcome)
    }

    /// Query item metadata without downloading. Returns the info plus a
    /// display name for the source platform.
    pub async fn inspect(&self, url: &str) -> Result<(MediaInfo, String)> {
        if !platform::is_valid_url(url) {
            return Err(VeloraError::InvalidUrl(ErrorKind::InvalidUrl.user_message()));
        }

        let info = self.fetcher.inspect(url).await?;
        let profile = platform::classify(url);
        let platform_name = if profile.platform == Platform::Unknown {
            info.extractor
                .as_deref()
                .map(platform::display_name_from_extractor)
                .unwrap_or_else(|| "Unknown".to_string())
        } else {
            profile.platform.to_string()
        };

        Ok((info, platform_name))
    }

    /// The most recent finished downloads under the base directory.
    pub fn recent_downloads(&self, limit: usize) -> Result<Vec<(std::path::PathBuf, u64)>> {
        ArtifactManager::new(&self.config.download.base_dir).recent_downloads(limit)
    }
}

/// Deterministic batch subdirectory name for a run timestamp.
fn batch_dir_name(now: &DateTime<Local>) -> String {
    format!("batch-{}", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchOutput, MockFetcherTrait};
    use crate::request::{Resolution, VideoContainer};
    use chrono::TimeZone;
    use std::fs;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.download.base_dir = dir.to_path_buf();
        config
    }

    fn write_artifact_for(command: &crate::fetch::FetchCommand, title: &str, ext: &str) {
        let template_pos = command.args.iter().position(|a| a == "-o").unwrap() + 1;
        let produced = command.args[template_pos]
            .replace("%(title)s", title)
            .replace("%(ext)s", ext);
        fs::write(produced, b"media").unwrap();
    }

    #[test]
    fn test_batch_dir_name_is_deterministic() {
        let ts = Local.with_ymd_and_hms(2025, 3, 9, 14, 30, 5).unwrap();
        assert_eq!(batch_dir_name(&ts), "batch-20250309-143005");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_invoking_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        // No expectations: a run call would panic
        let fetcher = MockFetcherTrait::new();
        let workflow =
            Workflow::with_components(test_config(dir.path()), Box::new(fetcher), None);

        let request = DownloadRequest::video(
            "not-a-url",
            Resolution::Best,
            true,
            VideoContainer::Mp4,
        );
        let outcome = workflow.run_single(&request).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::InvalidUrl));
    }

    #[tokio::test]
    async fn test_single_job_without_transcoder_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockFetcherTrait::new();
        fetcher.expect_run().times(1).returning(|command| {
            write_artifact_for(&command, "Clip", "mp4");
            Ok(FetchOutput {
                success: true,
                stderr: String::new(),
            })
        });

        let workflow =
            Workflow::with_components(test_config(dir.path()), Box::new(fetcher), None);
        let request = DownloadRequest::video(
            "https://www.youtube.com/watch?v=x",
            Resolution::Best,
            true,
            VideoContainer::Mp4,
        );
        let outcome = workflow.run_single(&request).await.unwrap();

        assert!(outcome.success);
        let final_path = outcome.final_path.unwrap();
        assert_eq!(final_path.file_name().unwrap(), "Clip.mp4");
        assert!(final_path.exists());
    }

    #[tokio::test]
    async fn test_failed_optional_stage_still_reports_success() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockFetcherTrait::new();
        fetcher.expect_run().times(1).returning(|command| {
            write_artifact_for(&command, "Clip", "webm");
            Ok(FetchOutput {
                success: true,
                stderr: String::new(),
            })
        });

        // No transcoder: the requested webm->mp4 conversion cannot run
        let workflow =
            Workflow::with_components(test_config(dir.path()), Box::new(fetcher), None);
        let request = DownloadRequest::video(
            "https://www.youtube.com/watch?v=x",
            Resolution::Best,
            true,
            VideoContainer::Mp4,
        );
        let outcome = workflow.run_single(&request).await.unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.final_path.as_ref().unwrap().file_name().unwrap(),
            "Clip.webm"
        );
        assert_eq!(
            outcome.degraded_stages(),
            vec![crate::outcome::StageKind::ContainerConvert]
        );
    }

    #[tokio::test]
    async fn test_batch_continues_past_failed_items() {
        let dir = tempfile::tempdir().unwrap();

        let mut fetcher = MockFetcherTrait::new();
        let mut calls = 0usize;
        // First item: both strategies fail. Second item: first strategy
        // succeeds.
        fetcher.expect_run().returning(move |command| {
            calls += 1;
            if calls <= 2 {
                Ok(FetchOutput {
                    success: false,
                    stderr: "ERROR: Video unavailable".to_string(),
                })
            } else {
                write_artifact_for(&command, "Second", "mp4");
                Ok(FetchOutput {
                    success: true,
                    stderr: String::new(),
                })
            }
        });

        let workflow =
            Workflow::with_components(test_config(dir.path()), Box::new(fetcher), None);
        let template = DownloadRequest::video(
            String::new(),
            Resolution::Best,
            true,
            VideoContainer::Mp4,
        );
        let urls = vec![
            "https://www.youtube.com/watch?v=gone".to_string(),
            "https://www.youtube.com/watch?v=ok".to_string(),
        ];
        let batch = workflow.run_batch(&urls, &template).await.unwrap();

        assert_eq!(batch.total(), 2);
        assert_eq!(batch.succeeded(), 1);
        assert_eq!(batch.outcomes[0].1.error, Some(ErrorKind::Unavailable));
        assert!(batch.outcomes[1].1.success);
        assert!(batch.dir.starts_with(dir.path()));
    }
}
