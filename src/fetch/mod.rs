// Fetch-tool abstraction
//
// The external fetch tool (yt-dlp compatible) is driven entirely through
// its command line and judged by exit code plus stderr text:
// - Commands: argument builders honoring the tool's invocation contract
// - Processor: concrete implementation bound to a resolved binary path

pub mod command;
pub mod processor;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

pub use command::*;
pub use processor::*;

use crate::error::Result;

/// Result of one fetch invocation. A non-zero exit is not an error at this
/// layer; the acquisition executor classifies the captured stderr.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub success: bool,
    pub stderr: String,
}

/// Metadata reported by the fetch tool for a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub extractor: Option<String>,
}

/// Main trait for fetch-tool operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FetcherTrait: Send + Sync {
    /// Run a fetch command to completion, capturing its exit disposition
    async fn run(&self, command: FetchCommand) -> Result<FetchOutput>;

    /// Query item metadata without downloading
    async fn inspect(&self, url: &str) -> Result<MediaInfo>;

    /// Check if the fetch tool responds to a version probe
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating fetcher instances
pub struct FetcherFactory;

impl FetcherFactory {
    /// Create the default fetcher bound to a resolved binary path
    pub fn create_fetcher(binary_path: String) -> Box<dyn FetcherTrait> {
        Box::new(processor::FetcherImpl::new(binary_path))
    }
}
