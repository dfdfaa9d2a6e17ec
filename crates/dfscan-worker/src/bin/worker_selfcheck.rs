use std::path::Path;
use std::process::Command;

use dfscan_detector::{CatalogConfig, DetectorLoader, ModelCatalog};
use dfscan_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    let catalog = ModelCatalog::new(CatalogConfig::from_env());

    println!(
        "worker-selfcheck: starting with data_dir={}",
        config.data_dir.display()
    );
    ensure_data_dir(&config.data_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;
    ensure_default_model(&catalog)?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_data_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", name, output.status));
    }
    Ok(())
}

fn ensure_default_model(catalog: &ModelCatalog) -> anyhow::Result<()> {
    let default_model = &catalog.config().default_model;
    let models = catalog.list();
    let info = models
        .iter()
        .find(|m| &m.key == default_model)
        .ok_or_else(|| anyhow::anyhow!("default model {} is not in the catalog", default_model))?;

    if !info.available {
        return Err(anyhow::anyhow!(
            "weights for {} not found in {}",
            default_model,
            catalog.config().weights_dir.display()
        ));
    }
    let available = models.iter().filter(|m| m.available).count();
    println!("worker-selfcheck: {} of {} models available", available, models.len());
    Ok(())
}
