use serde::{Deserialize, Serialize};

use crate::platform::PlatformProfile;
use crate::request::{AudioFormat, DownloadRequest, Resolution, VideoContainer};

/// One acquisition attempt: how to ask the fetch tool for streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Selector expression for the fetch tool; None means its default
    pub selector: Option<String>,
    /// Use the tool's audio extraction mode instead of a plain fetch
    pub extract_audio: bool,
    /// Artifact is acquired at best quality and the downscale stage is
    /// expected to bring it to the target height afterwards
    pub downscale_after: bool,
    /// Artifact is a video and the audio-extract stage is expected to pull
    /// the audio track out afterwards
    pub extract_after: bool,
    /// Human-readable name for diagnostics
    pub label: String,
}

impl Strategy {
    fn with_selector(selector: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            extract_audio: false,
            downscale_after: false,
            extract_after: false,
            label: label.into(),
        }
    }

    fn downscale_after(mut self) -> Self {
        self.downscale_after = true;
        self
    }
}

/// Ordered acquisition strategies plus the deferred output decisions.
///
/// The desired final container is carried here and resolved by the
/// post-processing pipeline; it is never folded into the selector because
/// the fetch tool's inline remux support is unreliable for some containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionPlan {
    pub strategies: Vec<Strategy>,
    pub final_container: VideoContainer,
    pub audio_only: bool,
    pub audio_format: AudioFormat,
}

/// Turn a request and a platform profile into the ordered strategy list.
/// The returned plan always holds at least one strategy.
pub fn plan(request: &DownloadRequest, profile: &PlatformProfile) -> AcquisitionPlan {
    let strategies = if request.audio_only {
        audio_strategies(request)
    } else {
        video_strategies(request, profile)
    };

    debug_assert!(!strategies.is_empty());

    AcquisitionPlan {
        strategies,
        final_container: request.output_format,
        audio_only: request.audio_only,
        audio_format: request.audio_format,
    }
}

fn audio_strategies(request: &DownloadRequest) -> Vec<Strategy> {
    vec![
        Strategy {
            selector: None,
            extract_audio: true,
            downscale_after: false,
            extract_after: false,
            label: format!("audio-extract-{}", request.audio_format),
        },
        // Some extractors cannot serve a bare audio stream; take the best
        // video and pull the audio track out locally.
        Strategy {
            selector: Some("best".to_string()),
            extract_audio: false,
            downscale_after: false,
            extract_after: true,
            label: "best-then-extract".to_string(),
        },
    ]
}

fn video_strategies(request: &DownloadRequest, profile: &PlatformProfile) -> Vec<Strategy> {
    match request.resolution {
        Resolution::Best => {
            let preferred = if request.include_audio {
                Strategy::with_selector("bestvideo+bestaudio/best", "best-pair")
            } else {
                Strategy::with_selector("bestvideo", "best-video-only")
            };
            // Stream-pair selection is not supported everywhere
            vec![preferred, Strategy::with_selector("best", "best-any")]
        }
        Resolution::Tier(height) if profile.needs_downscale() => {
            // The platform only serves native tiers; acquire best and let
            // the downscale stage hit the target
            vec![
                Strategy::with_selector("bestvideo+bestaudio/best", "best-for-downscale")
                    .downscale_after(),
                Strategy::with_selector("best", format!("best-any-for-{}p", height))
                    .downscale_after(),
            ]
        }
        Resolution::Tier(height) => {
            let bounded = if request.include_audio {
                format!(
                    "bestvideo[height<={}]+bestaudio/best[height<={}]",
                    height, height
                )
            } else {
                format!("bestvideo[height<={}]", height)
            };
            // Height-bounded selectors are not exposed by every source;
            // the unbounded fallback downscales locally instead
            vec![
                Strategy::with_selector(bounded, format!("bounded-{}p", height)),
                Strategy::with_selector("best", "best-then-downscale").downscale_after(),
            ]
        }
    }
}
