use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::acquire::Acquired;
use crate::artifact::ArtifactManager;
use crate::error::Result;
use crate::media::TranscoderTrait;
use crate::outcome::{StageKind, StageRecord, StageResult};
use crate::plan::AcquisitionPlan;
use crate::request::{DownloadRequest, Resolution};

/// Runs the conditional post-processing stages over an acquired artifact.
///
/// Stage failures never propagate: the pre-stage artifact stays current and
/// the failure is recorded, so an optional transform can never discard a
/// successful acquisition.
pub struct PostProcessor<'a> {
    transcoder: Option<&'a dyn TranscoderTrait>,
    artifacts: &'a ArtifactManager,
}

impl<'a> PostProcessor<'a> {
    pub fn new(
        transcoder: Option<&'a dyn TranscoderTrait>,
        artifacts: &'a ArtifactManager,
    ) -> Self {
        Self {
            transcoder,
            artifacts,
        }
    }

    /// Run every applicable stage in order and return the final artifact
    /// path plus the per-stage record.
    pub async fn run(
        &self,
        acquired: &Acquired,
        request: &DownloadRequest,
        plan: &AcquisitionPlan,
    ) -> (PathBuf, Vec<StageRecord>) {
        let mut current = acquired.path.clone();
        let mut records = Vec::new();

        if plan.audio_only && acquired.strategy.extract_after {
            let (result, next) = self.audio_extract_stage(&current, plan).await;
            record_stage(&mut records, StageKind::AudioExtract, result, &mut current, next);
        }

        if !plan.audio_only && !request.include_audio {
            let (result, next) = self.audio_strip_stage(&current).await;
            record_stage(&mut records, StageKind::AudioStrip, result, &mut current, next);
        }

        if !plan.audio_only && acquired.strategy.downscale_after {
            if let Resolution::Tier(height) = request.resolution {
                let (result, next) = self.downscale_stage(&current, height).await;
                record_stage(&mut records, StageKind::Downscale, result, &mut current, next);
            }
        }

        if !plan.audio_only {
            let (result, next) = self.convert_stage(&current, plan).await;
            record_stage(
                &mut records,
                StageKind::ContainerConvert,
                result,
                &mut current,
                next,
            );
        }

        (current, records)
    }

    /// Audio-only fallback: the acquisition produced a video; pull the audio
    /// track out and drop the video.
    async fn audio_extract_stage(
        &self,
        current: &Path,
        plan: &AcquisitionPlan,
    ) -> (StageResult, Option<PathBuf>) {
        let Some(transcoder) = self.transcoder else {
            return unavailable();
        };

        match transcoder.probe(current).await {
            Ok(report) if !report.has_video() => return (StageResult::Skipped, None),
            Ok(_) => {}
            Err(e) => return (StageResult::Failed(e.to_string()), None),
        }

        let final_name = renamed(current, plan.audio_format.extension());
        let staged = self.artifacts.stage_path("extract", &final_name);

        match transcoder
            .extract_audio(current, &staged, plan.audio_format)
            .await
        {
            Ok(()) => match self.finalize(current, &staged, &final_name) {
                Ok(path) => (StageResult::FastPath, Some(path)),
                Err(e) => (StageResult::Failed(e.to_string()), None),
            },
            Err(e) => {
                self.discard(&staged);
                (StageResult::Failed(e.to_string()), None)
            }
        }
    }

    /// Drop the audio track when the request excluded audio but the
    /// acquired streams still carry one.
    async fn audio_strip_stage(&self, current: &Path) -> (StageResult, Option<PathBuf>) {
        let Some(transcoder) = self.transcoder else {
            return unavailable();
        };

        match transcoder.probe(current).await {
            Ok(report) if !report.has_audio() => return (StageResult::Skipped, None),
            Ok(_) => {}
            Err(e) => return (StageResult::Failed(e.to_string()), None),
        }

        let final_name = file_name(current);
        let staged = self.artifacts.stage_path("noaudio", &final_name);

        match transcoder.strip_audio(current, &staged).await {
            Ok(()) => match self.finalize(current, &staged, &final_name) {
                Ok(path) => (StageResult::FastPath, Some(path)),
                Err(e) => (StageResult::Failed(e.to_string()), None),
            },
            Err(e) => {
                self.discard(&staged);
                (StageResult::Failed(e.to_string()), None)
            }
        }
    }

    /// Bring the artifact down to the target height. Never upscales: a
    /// probed height at or below the target is already satisfied.
    async fn downscale_stage(
        &self,
        current: &Path,
        target_height: u32,
    ) -> (StageResult, Option<PathBuf>) {
        let Some(transcoder) = self.transcoder else {
            return unavailable();
        };

        match transcoder.probe(current).await {
            Ok(report) => match report.height() {
                Some(height) if height > target_height => {}
                _ => return (StageResult::Skipped, None),
            },
            Err(e) => return (StageResult::Failed(e.to_string()), None),
        }

        let final_name = file_name(current);
        let staged = self.artifacts.stage_path("scaled", &final_name);

        match transcoder.downscale(current, &staged, target_height).await {
            Ok(()) => match self.finalize(current, &staged, &final_name) {
                Ok(path) => (StageResult::FastPath, Some(path)),
                Err(e) => (StageResult::Failed(e.to_string()), None),
            },
            Err(e) => {
                self.discard(&staged);
                (StageResult::Failed(e.to_string()), None)
            }
        }
    }

    /// Move the artifact into the requested container: stream copy first,
    /// re-encode with the container's codec pair when the copy is refused.
    async fn convert_stage(
        &self,
        current: &Path,
        plan: &AcquisitionPlan,
    ) -> (StageResult, Option<PathBuf>) {
        let target = plan.final_container;
        let current_ext = current
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if current_ext.eq_ignore_ascii_case(target.extension()) {
            return (StageResult::Skipped, None);
        }

        let Some(transcoder) = self.transcoder else {
            return unavailable();
        };

        let final_name = renamed(current, target.extension());
        let staged = self.artifacts.stage_path("convert", &final_name);

        match transcoder.remux(current, &staged).await {
            Ok(()) => match self.finalize(current, &staged, &final_name) {
                Ok(path) => (StageResult::FastPath, Some(path)),
                Err(e) => (StageResult::Failed(e.to_string()), None),
            },
            Err(remux_err) => {
                warn!(
                    "Stream copy into {} refused, re-encoding: {}",
                    target, remux_err
                );
                self.discard(&staged);

                match transcoder.reencode(current, &staged, target).await {
                    Ok(()) => match self.finalize(current, &staged, &final_name) {
                        Ok(path) => (StageResult::FallbackPath, Some(path)),
                        Err(e) => (StageResult::Failed(e.to_string()), None),
                    },
                    Err(encode_err) => {
                        self.discard(&staged);
                        (StageResult::Failed(encode_err.to_string()), None)
                    }
                }
            }
        }
    }

    /// Delete the stage's input and move its output into place under the
    /// final name, so at most one full copy survives the stage.
    fn finalize(&self, input: &Path, staged: &Path, final_name: &str) -> Result<PathBuf> {
        self.artifacts.remove(input)?;
        let final_path = self.artifacts.work_dir().join(final_name);
        self.artifacts.replace(staged, &final_path)?;
        Ok(final_path)
    }

    fn discard(&self, staged: &Path) {
        if staged.exists() {
            let _ = self.artifacts.remove(staged);
        }
    }
}

fn unavailable() -> (StageResult, Option<PathBuf>) {
    (
        StageResult::Failed("transcoder unavailable".to_string()),
        None,
    )
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn renamed(path: &Path, extension: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}.{}", stem, extension)
}

fn record_stage(
    records: &mut Vec<StageRecord>,
    stage: StageKind,
    result: StageResult,
    current: &mut PathBuf,
    next: Option<PathBuf>,
) {
    match &result {
        StageResult::Failed(reason) => {
            warn!("Stage {} failed, keeping prior artifact: {}", stage, reason)
        }
        StageResult::Skipped => info!("Stage {}: already satisfied", stage),
        _ => info!("Stage {}: done", stage),
    }
    if let Some(path) = next {
        *current = path;
    }
    records.push(StageRecord { stage, result });
}
