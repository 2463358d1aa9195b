use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a single video
    Download {
        /// Source URL
        url: String,

        /// Target resolution: best, or a tier like 1080p, 720p, 480p
        #[arg(short, long)]
        resolution: Option<String>,

        /// Final container: mp4, mkv, webm, mov, avi
        #[arg(short, long)]
        format: Option<String>,

        /// Drop the audio track
        #[arg(long)]
        no_audio: bool,

        /// Download directory override
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Download only the audio track
    Audio {
        /// Source URL
        url: String,

        /// Audio container: mp3, m4a, opus, flac, wav
        #[arg(short, long)]
        format: Option<String>,

        /// Download directory override
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Download a list of URLs into one timestamped subdirectory
    Batch {
        /// Source URLs
        urls: Vec<String>,

        /// File with one URL per line (# comments allowed)
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Target resolution applied to every item
        #[arg(short, long)]
        resolution: Option<String>,

        /// Final container applied to every item
        #[arg(short, long)]
        format: Option<String>,

        /// Drop the audio track of every item
        #[arg(long)]
        no_audio: bool,

        /// Treat every item as an audio-only download
        #[arg(long)]
        audio_only: bool,
    },

    /// Show item metadata without downloading
    Info {
        /// Source URL
        url: String,
    },
}
