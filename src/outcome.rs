use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Cause classification for a failed acquisition, derived from the fetch
/// tool's stderr text or from local validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// URL rejected by the fetch tool or by local shape validation
    InvalidUrl,
    /// Source reports the item private or removed
    Unavailable,
    /// Source reports 404/missing
    NotFound,
    /// A required external binary could not be located or executed
    ToolUnavailable(String),
    /// Any other non-zero exit, with the raw stderr for diagnostics
    Unknown(String),
}

impl ErrorKind {
    /// One-line, cause-classified message for the caller boundary.
    pub fn user_message(&self) -> String {
        match self {
            ErrorKind::InvalidUrl => {
                "Invalid video URL. Please check the URL and try again.".to_string()
            }
            ErrorKind::Unavailable => {
                "Video is unavailable or private. Please try a different URL.".to_string()
            }
            ErrorKind::NotFound => {
                "Video not found. Please check the URL and try again.".to_string()
            }
            ErrorKind::ToolUnavailable(tool) => {
                format!("Required tool not found: {}", tool)
            }
            ErrorKind::Unknown(stderr) => {
                // The fetch tool puts its ERROR line last
                let last_line = stderr.lines().last().unwrap_or("").trim();
                if last_line.is_empty() {
                    "Download failed for an unknown reason.".to_string()
                } else {
                    format!("Download failed: {}", last_line)
                }
            }
        }
    }
}

/// The stderr classification table. First matching substring wins; anything
/// unmatched is Unknown with the raw text attached.
const STDERR_RULES: &[(&str, ErrorKind)] = &[
    ("is not a valid URL", ErrorKind::InvalidUrl),
    ("Unsupported URL", ErrorKind::InvalidUrl),
    ("Video unavailable", ErrorKind::Unavailable),
    ("Private video", ErrorKind::Unavailable),
    ("not found", ErrorKind::NotFound),
    ("404", ErrorKind::NotFound),
];

/// Classify the fetch tool's stderr into an ErrorKind.
pub fn classify_stderr(stderr: &str) -> ErrorKind {
    STDERR_RULES
        .iter()
        .find(|(needle, _)| stderr.contains(*needle))
        .map(|(_, kind)| kind.clone())
        .unwrap_or_else(|| ErrorKind::Unknown(stderr.to_string()))
}

/// Post-processing stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    AudioExtract,
    AudioStrip,
    Downscale,
    ContainerConvert,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::AudioExtract => "audio-extract",
            StageKind::AudioStrip => "audio-strip",
            StageKind::Downscale => "downscale",
            StageKind::ContainerConvert => "container-convert",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a single post-processing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageResult {
    /// Stage's postcondition already held; zero file operations
    Skipped,
    /// Stream-copy path succeeded
    FastPath,
    /// Fast path failed; the re-encode fallback succeeded
    FallbackPath,
    /// Stage failed; the pre-stage artifact was kept
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub result: StageResult,
}

/// Terminal result of one download job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub final_path: Option<PathBuf>,
    pub error: Option<ErrorKind>,
    pub stages: Vec<StageRecord>,
}

impl JobOutcome {
    pub fn succeeded(final_path: PathBuf, stages: Vec<StageRecord>) -> Self {
        Self {
            success: true,
            final_path: Some(final_path),
            error: None,
            stages,
        }
    }

    pub fn failed(error: ErrorKind) -> Self {
        Self {
            success: false,
            final_path: None,
            error: Some(error),
            stages: Vec::new(),
        }
    }

    /// Stages that failed but were recovered by the degrade-gracefully
    /// policy. Non-empty on a successful outcome means the final artifact is
    /// the best obtainable, not the exact request.
    pub fn degraded_stages(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|r| matches!(r.result, StageResult::Failed(_)))
            .map(|r| r.stage)
            .collect()
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub dir: PathBuf,
    pub outcomes: Vec<(String, JobOutcome)>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_url() {
        assert_eq!(
            classify_stderr("ERROR: 'abc' is not a valid URL"),
            ErrorKind::InvalidUrl
        );
        assert_eq!(
            classify_stderr("ERROR: Unsupported URL: https://example.org"),
            ErrorKind::InvalidUrl
        );
    }

    #[test]
    fn test_classify_unavailable() {
        assert_eq!(
            classify_stderr("ERROR: Video unavailable"),
            ErrorKind::Unavailable
        );
        assert_eq!(
            classify_stderr("ERROR: Private video. Sign in if you've been granted access"),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_classify_not_found() {
        assert_eq!(classify_stderr("ERROR: HTTP Error 404"), ErrorKind::NotFound);
        assert_eq!(
            classify_stderr("ERROR: requested item was not found"),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_unmatched_stderr_is_unknown_with_raw_text() {
        let kind = classify_stderr("ERROR: fragment 3 failed");
        assert_eq!(kind, ErrorKind::Unknown("ERROR: fragment 3 failed".to_string()));
    }

    #[test]
    fn test_user_message_is_one_line() {
        let kind = classify_stderr("WARNING: noise\nERROR: something exploded");
        assert!(!kind.user_message().contains('\n'));
    }

    #[test]
    fn test_degraded_stages_filters_failures() {
        let outcome = JobOutcome::succeeded(
            PathBuf::from("/tmp/a.mp4"),
            vec![
                StageRecord {
                    stage: StageKind::Downscale,
                    result: StageResult::FastPath,
                },
                StageRecord {
                    stage: StageKind::ContainerConvert,
                    result: StageResult::Failed("remux failed".to_string()),
                },
            ],
        );
        assert_eq!(outcome.degraded_stages(), vec![StageKind::ContainerConvert]);
    }
}
