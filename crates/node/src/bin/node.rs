use argh::FromArgs;
use std::path::PathBuf;
use tokio::sync::watch;

use stillgrid_node::capture::FileCapture;
use stillgrid_node::config::NodeConfig;
use stillgrid_node::sender::PeriodicSender;
use stillgrid_node::store::FrameStore;

/// Stillgrid capture node: sends the latest still image to the hub on a timer.
#[derive(FromArgs)]
struct Args {
    /// path to node configuration file
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("configs/node.yaml")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    log::info!("Loading config from: {}", args.config.display());
    let config = NodeConfig::load(&args.config)?;

    let store = FrameStore::new();
    let capture = FileCapture::new(&config.capture, store.clone());
    let sender = PeriodicSender::new(&config, store);

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    })?;

    let capture_task = tokio::spawn(capture.run(shutdown_rx.clone()));
    sender.run(shutdown_rx).await?;

    capture_task.await??;
    Ok(())
}
