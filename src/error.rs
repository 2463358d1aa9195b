use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeloraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Fetch tool error: {0}")]
    Fetch(String),

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Required tool not found: {0}")]
    ToolUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, VeloraError>;
