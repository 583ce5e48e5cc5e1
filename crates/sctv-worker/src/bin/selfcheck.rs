use std::process::Command;

use sctv_ml_client::HttpDetector;
use sctv_registry::RegistryClient;
use sctv_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "sctv-selfcheck: starting with registry={} detector={}",
        config.api_base_url, config.detector_url
    );
    ensure_ffmpeg()?;
    ensure_registry(&config).await?;
    ensure_detector(&config).await?;

    println!("sctv-selfcheck: ok");
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let path = which::which("ffmpeg").map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let output = Command::new(&path).arg("-version").output()?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}

async fn ensure_registry(config: &WorkerConfig) -> anyhow::Result<()> {
    let client = RegistryClient::new(config.registry_config())?;
    let streams = client.fetch_active().await?;
    println!("sctv-selfcheck: registry lists {} active streams", streams.len());
    Ok(())
}

async fn ensure_detector(config: &WorkerConfig) -> anyhow::Result<()> {
    let detector = HttpDetector::new(config.ml_client_config())?;
    if !detector.health_check().await? {
        return Err(anyhow::anyhow!(
            "detector at {} is not healthy",
            config.detector_url
        ));
    }
    Ok(())
}
