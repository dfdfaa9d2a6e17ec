//! Analyze a local video file and print the result as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dfscan_detector::{CatalogConfig, ModelCatalog};
use dfscan_models::{AnalysisOptions, JobStatus, DEFAULT_TARGET_FPS, DEFAULT_THRESHOLD};
use dfscan_worker::{AnalysisService, JsonFileJobStore, WorkerConfig};

#[derive(Parser)]
#[command(name = "dfscan-analyze")]
#[command(about = "Score a video frame by frame and report suspicious segments")]
#[command(version)]
struct Cli {
    /// Video file to analyze
    video: PathBuf,

    /// Detection model key (defaults to DEFAULT_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Frames per second to analyze
    #[arg(long, default_value_t = DEFAULT_TARGET_FPS)]
    fps: f64,

    /// Score at or above which a frame counts as suspicious
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Directory for job artifacts (overrides DFSCAN_DATA_DIR)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,dfscan=info")))
        .init();

    let cli = Cli::parse();

    let mut config = WorkerConfig::from_env();
    if let Some(out) = cli.out {
        config.data_dir = out;
    }
    let catalog_config = CatalogConfig::from_env();
    let options = AnalysisOptions::default()
        .with_model(cli.model.unwrap_or_else(|| catalog_config.default_model.clone()))
        .with_target_fps(cli.fps)
        .with_threshold(cli.threshold);

    let video = tokio::fs::read(&cli.video)
        .await
        .with_context(|| format!("failed to read {}", cli.video.display()))?;
    let extension = cli.video.extension().and_then(|e| e.to_str());

    let store = Arc::new(JsonFileJobStore::new(&config.data_dir));
    let service = AnalysisService::new(config, Arc::new(ModelCatalog::new(catalog_config)), store);
    let id = service.submit_analysis(&video, extension, options).await?;
    eprintln!("dfscan-analyze: job {}", id);

    let mut last_progress = None;
    let snapshot = loop {
        let snapshot = service.poll(&id).await?;
        if last_progress != Some(snapshot.progress) {
            eprintln!("[{:>3}%] {}", snapshot.progress, snapshot.message);
            last_progress = Some(snapshot.progress);
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };
    service.shutdown().await;

    if snapshot.status == JobStatus::Error {
        anyhow::bail!("analysis failed: {}", snapshot.message);
    }
    let result = service.get_result(&id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
