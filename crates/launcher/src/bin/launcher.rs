use argh::FromArgs;
use std::path::PathBuf;
use tokio::sync::watch;

use stillgrid_launcher::config::LauncherConfig;
use stillgrid_launcher::supervisor::Supervisor;

/// Stillgrid launcher: starts and stops the capture process on MQTT commands.
#[derive(FromArgs)]
struct Args {
    /// path to launcher configuration file
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("configs/launcher.yaml")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    log::info!("Loading config from: {}", args.config.display());
    let config = LauncherConfig::load(&args.config)?;
    config.check_executable()?;

    log::info!(
        "Managing node {} capture process: {}",
        config.node_id,
        config.executable.display()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    })?;

    Supervisor::new(config).run(shutdown_rx).await?;
    Ok(())
}
