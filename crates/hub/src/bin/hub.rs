use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use stillgrid_hub::config::HubConfig;
use stillgrid_hub::server::IngestionServer;
use stillgrid_hub::sink::LogSink;

/// Stillgrid ingestion hub: receives framed still images from capture nodes.
#[derive(FromArgs)]
struct Args {
    /// path to hub configuration file
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("configs/hub.yaml")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    log::info!("Loading config from: {}", args.config.display());
    let config = HubConfig::load(&args.config)?;

    let server = IngestionServer::bind(&config, Arc::new(LogSink)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    })?;

    server.run(shutdown_rx).await?;
    Ok(())
}
