use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{Result, VeloraError};

// Structs for parsing the prober's JSON output

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: ProbeFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeStream {
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeFormat {
    pub format_name: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ProbeReport {
    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.codec_type == "audio")
    }

    pub fn has_video(&self) -> bool {
        self.streams.iter().any(|s| s.codec_type == "video")
    }

    /// Height of the first video stream, if any
    pub fn height(&self) -> Option<u32> {
        self.streams
            .iter()
            .find(|s| s.codec_type == "video")
            .and_then(|s| s.height)
    }

    /// Whether the demuxer name list covers the given container name.
    /// The prober reports families like "mov,mp4,m4a,3gp,3g2,mj2".
    pub fn container_is(&self, name: &str) -> bool {
        self.format.format_name.split(',').any(|n| n.trim() == name)
    }
}

/// Run the stream prober over a file and parse its JSON report.
pub fn run_probe(probe_binary: &str, path: &Path) -> Result<ProbeReport> {
    debug!("Probing: {}", path.display());

    let output = Command::new(probe_binary)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .map_err(|e| VeloraError::Probe(format!("Failed to execute prober: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VeloraError::Probe(format!(
            "Probe of {} failed: {}",
            path.display(),
            stderr
        )));
    }

    let report: ProbeReport = serde_json::from_slice(&output.stdout)
        .map_err(|e| VeloraError::Probe(format!("Failed to parse probe report: {}", e)))?;
    Ok(report)
}
