//! Velora - Resilient Media Download Workflow
//!
//! This is the main entry point for the Velora application: a download
//! orchestrator around a yt-dlp-compatible fetch tool and ffmpeg, with
//! fallback acquisition strategies and graceful post-processing.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use velora::artifact::ArtifactManager;
use velora::cli::{Args, Commands};
use velora::config::Config;
use velora::error::VeloraError;
use velora::outcome::{BatchOutcome, JobOutcome};
use velora::request::{AudioFormat, DownloadRequest, Resolution, VideoContainer};
use velora::setup::SetupManager;
use velora::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Resolve the external tools once, up front
    let setup_manager = SetupManager::new();
    if let Err(e) = setup_manager.initialize(&mut config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Execute command
    match args.command {
        Commands::Download {
            url,
            resolution,
            format,
            no_audio,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.download.base_dir = dir;
            }
            let resolution: Resolution = resolution
                .as_deref()
                .unwrap_or(&config.download.video_quality)
                .parse()?;
            let format: VideoContainer = format
                .as_deref()
                .unwrap_or(&config.download.video_format)
                .parse()?;

            let request = DownloadRequest::video(url, resolution, !no_audio, format);
            println!("Downloading to: {}", config.download.base_dir.display());
            println!("Resolution: {}  Audio: {}  Container: {}",
                resolution,
                if no_audio { "no" } else { "yes" },
                format,
            );

            spawn_interrupt_sweeper(config.download.base_dir.clone());
            let workflow = Workflow::new(config)?;
            let outcome = workflow.run_single(&request).await?;
            report_job(&outcome, &workflow)?;
        }
        Commands::Audio {
            url,
            format,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.download.base_dir = dir;
            }
            let format: AudioFormat = format
                .as_deref()
                .unwrap_or(&config.download.audio_format)
                .parse()?;

            let request = DownloadRequest::audio(url, format);
            println!("Downloading audio to: {}", config.download.base_dir.display());

            spawn_interrupt_sweeper(config.download.base_dir.clone());
            let workflow = Workflow::new(config)?;
            let outcome = workflow.run_single(&request).await?;
            report_job(&outcome, &workflow)?;
        }
        Commands::Batch {
            urls,
            from_file,
            resolution,
            format,
            no_audio,
            audio_only,
        } => {
            let mut all_urls = urls;
            if let Some(path) = from_file {
                all_urls.extend(read_url_list(&path)?);
            }
            if all_urls.is_empty() {
                eprintln!("No URLs given. Pass them as arguments or via --from-file.");
                std::process::exit(1);
            }

            let template = if audio_only {
                let format: AudioFormat = format
                    .as_deref()
                    .unwrap_or(&config.download.audio_format)
                    .parse()?;
                DownloadRequest::audio(String::new(), format)
            } else {
                let resolution: Resolution = resolution
                    .as_deref()
                    .unwrap_or(&config.download.video_quality)
                    .parse()?;
                let format: VideoContainer = format
                    .as_deref()
                    .unwrap_or(&config.download.video_format)
                    .parse()?;
                DownloadRequest::video(String::new(), resolution, !no_audio, format)
            };

            spawn_interrupt_sweeper(config.download.base_dir.clone());
            let workflow = Workflow::new(config)?;
            let batch = workflow.run_batch(&all_urls, &template).await?;
            report_batch(&batch);

            if batch.succeeded() == 0 {
                std::process::exit(1);
            }
        }
        Commands::Info { url } => {
            let workflow = Workflow::new(config)?;
            match workflow.inspect(&url).await {
                Ok((info, platform)) => {
                    println!("\nVideo Information:");
                    println!("   Title:    {}", info.title.as_deref().unwrap_or("Unknown"));
                    println!(
                        "   Duration: {}",
                        info.duration_string.as_deref().unwrap_or("Unknown")
                    );
                    println!(
                        "   Uploader: {}",
                        info.uploader.as_deref().unwrap_or("Unknown")
                    );
                    println!(
                        "   Views:    {}",
                        info.view_count
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "Unknown".to_string())
                    );
                    println!("   Platform: {}", platform);
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Sweep provisional files across the download tree on ctrl-c. The
/// terminal delivers the same signal to the in-flight external process,
/// which dies on its own; only the leftover files need handling here.
fn spawn_interrupt_sweeper(dir: std::path::PathBuf) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ArtifactManager::new(&dir).sweep_tree_provisional();
            eprintln!("\nCancelled.");
            std::process::exit(130);
        }
    });
}

/// Print a single job's outcome and the recent-downloads listing.
fn report_job(outcome: &JobOutcome, workflow: &Workflow) -> Result<()> {
    if outcome.success {
        if let Some(path) = &outcome.final_path {
            println!("\nDownload completed: {}", path.display());
        }
        for stage in outcome.degraded_stages() {
            println!("Note: optional {} step failed; kept the best available file", stage);
        }

        let recent = workflow.recent_downloads(5)?;
        if !recent.is_empty() {
            println!("Recent downloads:");
            for (path, size) in recent {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                println!("   - {} ({:.1} MB)", name, size as f64 / (1024.0 * 1024.0));
            }
        }
        Ok(())
    } else {
        let message = outcome
            .error
            .as_ref()
            .map(|e| e.user_message())
            .unwrap_or_else(|| "Download failed.".to_string());
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

fn report_batch(batch: &BatchOutcome) {
    println!(
        "\nBatch finished: {}/{} succeeded in {}",
        batch.succeeded(),
        batch.total(),
        batch.dir.display()
    );
    for (url, outcome) in &batch.outcomes {
        if !outcome.success {
            let message = outcome
                .error
                .as_ref()
                .map(|e| e.user_message())
                .unwrap_or_else(|| "failed".to_string());
            println!("   failed: {} ({})", url, message);
        }
    }
}

/// Read a newline-separated URL list, skipping blanks and # comments.
fn read_url_list(path: &std::path::Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        VeloraError::Config(format!("Failed to read URL list {}: {}", path.display(), e))
    })?;
    Ok(content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let velora_dir = std::env::current_dir()?.join(".velora");
    let log_dir = velora_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "velora.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
