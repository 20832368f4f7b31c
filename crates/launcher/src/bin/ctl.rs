//! Stillgrid operator CLI
//!
//! Usage:
//!   stillgrid-ctl start <node-id>      # Start the capture process on a node
//!   stillgrid-ctl stop <node-id>       # Stop the capture process on a node
//!   stillgrid-ctl status               # Print retained launcher presence
//!   stillgrid-ctl -b 192.168.1.47 ...  # Talk to a non-local broker

use argh::FromArgs;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};

use stillgrid::message::{topics, CommandMessage, PresenceRecord};

/// Send start/stop commands to stillgrid launchers and inspect presence.
#[derive(FromArgs)]
struct Args {
    /// MQTT broker host (default: 127.0.0.1)
    #[argh(option, short = 'b', default = "String::from(\"127.0.0.1\")")]
    broker: String,

    /// MQTT broker port (default: 1883)
    #[argh(option, short = 'p', default = "1883")]
    port: u16,

    /// topic prefix shared with the launchers (default: stillgrid)
    #[argh(option, short = 't', default = "topics::DEFAULT_PREFIX.to_string()")]
    prefix: String,

    #[argh(subcommand)]
    command: CtlCommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum CtlCommand {
    Start(StartArgs),
    Stop(StopArgs),
    Status(StatusArgs),
}

/// Start the capture process on a node
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
struct StartArgs {
    /// node id, 1-255
    #[argh(positional)]
    node_id: u8,
}

/// Stop the capture process on a node
#[derive(FromArgs)]
#[argh(subcommand, name = "stop")]
struct StopArgs {
    /// node id, 1-255
    #[argh(positional)]
    node_id: u8,
}

/// Print retained launcher presence records
#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
struct StatusArgs {
    /// seconds to listen for records before exiting (default: 2)
    #[argh(option, short = 'w', default = "2")]
    window: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Args = argh::from_env();

    match &args.command {
        CtlCommand::Start(cmd) => {
            send_command(&args, cmd.node_id, CommandMessage::start()).await
        }
        CtlCommand::Stop(cmd) => send_command(&args, cmd.node_id, CommandMessage::stop()).await,
        CtlCommand::Status(cmd) => watch_status(&args, cmd.window).await,
    }
}

fn connect(args: &Args) -> (AsyncClient, rumqttc::EventLoop) {
    let client_id = format!("{}-ctl-{}", args.prefix, std::process::id());
    let mut options = MqttOptions::new(client_id, &args.broker, args.port);
    options.set_keep_alive(Duration::from_secs(5));
    AsyncClient::new(options, 10)
}

/// Publish one command and wait for the broker's ack.
async fn send_command(args: &Args, node_id: u8, message: CommandMessage) -> anyhow::Result<()> {
    let topic = topics::command(&args.prefix, node_id);
    let (client, mut eventloop) = connect(args);

    // Commands are not retained; a late-joining launcher must not replay
    // an old one.
    client
        .publish(&topic, QoS::AtLeastOnce, false, serde_json::to_vec(&message)?)
        .await?;

    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(anyhow::anyhow!("Broker connection failed: {e}")),
            }
        }
    };
    match tokio::time::timeout(Duration::from_secs(10), flush).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Timed out waiting for the broker to ack the command"),
    }

    println!("{} -> {topic}", message.command);
    let _ = client.disconnect().await;
    Ok(())
}

/// Subscribe to the presence topic and print what the broker retains.
async fn watch_status(args: &Args, window: u64) -> anyhow::Result<()> {
    let topic = topics::presence(&args.prefix);
    let (client, mut eventloop) = connect(args);

    client.subscribe(&topic, QoS::AtLeastOnce).await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(window);
    loop {
        match tokio::time::timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                match serde_json::from_slice::<PresenceRecord>(&publish.payload) {
                    Ok(record) => {
                        println!(
                            "node {:>3}  {:<8} ({})",
                            record.id,
                            record.status.as_str(),
                            record.id_full
                        );
                    }
                    Err(_) => println!(
                        "unparsed record: {}",
                        String::from_utf8_lossy(&publish.payload)
                    ),
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => anyhow::bail!("Broker connection failed: {e}"),
            Err(_) => break, // window elapsed
        }
    }

    let _ = client.disconnect().await;
    Ok(())
}
