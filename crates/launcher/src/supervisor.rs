//! MQTT command loop and presence publishing.
//!
//! One subscription, one child. Commands apply strictly in arrival order;
//! a stop that waits out its grace period simply delays the next command.
//! Presence is retained on the shared status topic: `online` on every
//! (re)connect, `offline` explicitly on clean shutdown, and the pre-armed
//! last will covers crashes and network loss.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::watch;

use stillgrid::message::{topics, Command, CommandMessage, PresenceRecord};

use crate::config::LauncherConfig;
use crate::error::Result;
use crate::process::SupervisedChild;

/// Breather between reconnect attempts after a broker error.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long a clean shutdown waits for the offline record to be acked.
const OFFLINE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the command loop for one node's launcher.
pub struct Supervisor {
    config: LauncherConfig,
    child: SupervisedChild,
}

impl Supervisor {
    pub fn new(config: LauncherConfig) -> Self {
        let child = SupervisedChild::new("capture", config.executable.clone(), config.args.clone());
        Self { config, child }
    }

    /// Connect to the broker and serve commands until shutdown.
    ///
    /// The offline presence record is armed as a retained last will before
    /// connecting. Broker errors before the first ConnAck are fatal; later
    /// ones are logged while the connection retries. Whatever ends the
    /// loop, the child is stopped before the launcher leaves the channel.
    pub async fn run(mut self, shutdown_rx: watch::Receiver<()>) -> Result<()> {
        let client_id = self.config.client_id();
        let presence_topic = topics::presence(&self.config.topic_prefix);

        let mut options = MqttOptions::new(
            &client_id,
            &self.config.broker_host,
            self.config.broker_port,
        );
        options.set_keep_alive(self.config.keep_alive());

        let last_will =
            serde_json::to_vec(&PresenceRecord::offline(self.config.node_id, &client_id))?;
        options.set_last_will(LastWill::new(
            &presence_topic,
            last_will,
            QoS::AtLeastOnce,
            true,
        ));

        log::info!(
            "Connecting to broker {}:{} as {client_id}",
            self.config.broker_host,
            self.config.broker_port
        );
        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let outcome = self
            .serve(&client, &mut eventloop, &client_id, shutdown_rx)
            .await;

        // The child goes down before the launcher leaves the channel.
        self.child.stop(self.config.grace()).await;

        if outcome.is_ok() {
            publish_offline(
                &client,
                &mut eventloop,
                &presence_topic,
                self.config.node_id,
                &client_id,
            )
            .await;
        }

        log::info!("Launcher stopped");
        outcome
    }

    /// The command loop proper. Returns `Ok` on the shutdown signal, `Err`
    /// when the broker cannot be reached at all.
    async fn serve(
        &mut self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        client_id: &str,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> Result<()> {
        let command_topic = topics::command(&self.config.topic_prefix, self.config.node_id);
        let presence_topic = topics::presence(&self.config.topic_prefix);
        let mut connected_once = false;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    log::info!("Shutdown signal received");
                    return Ok(());
                }

                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected_once = true;
                        log::info!("Connected, subscribing to {command_topic}");
                        client.subscribe(&command_topic, QoS::AtLeastOnce).await?;

                        // Re-announced on every reconnect: the broker may
                        // have delivered the last will in between.
                        let online = PresenceRecord::online(self.config.node_id, client_id);
                        let payload = serde_json::to_vec(&online)?;
                        if let Err(e) = client
                            .publish(&presence_topic, QoS::AtLeastOnce, true, payload)
                            .await
                        {
                            log::warn!("Failed to queue online status: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.handle_command(&publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) if !connected_once => {
                        log::error!("Broker unreachable: {e}");
                        return Err(e.into());
                    }
                    Err(e) => {
                        log::warn!("Broker connection lost: {e}, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        }
    }

    /// Apply one command payload. Malformed JSON and unknown verbs are
    /// logged and dropped; neither disturbs the child.
    async fn handle_command(&mut self, payload: &[u8]) {
        let envelope: CommandMessage = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Ignoring malformed command payload: {e}");
                return;
            }
        };

        match envelope.verb() {
            Some(Command::Start) => {
                self.child.start();
            }
            Some(Command::Stop) => {
                self.child.stop(self.config.grace()).await;
            }
            None => log::warn!("Ignoring unknown command '{}'", envelope.command),
        }
    }
}

/// Leave a retained offline record and disconnect.
///
/// The last will only covers ungraceful exits; a clean disconnect delivers
/// no will, so without this the status topic would keep claiming `online`.
async fn publish_offline(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    presence_topic: &str,
    node_id: u8,
    client_id: &str,
) {
    let record = PresenceRecord::offline(node_id, client_id);
    let payload = match serde_json::to_vec(&record) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Failed to encode offline status: {e}");
            return;
        }
    };

    if let Err(e) = client
        .publish(presence_topic, QoS::AtLeastOnce, true, payload)
        .await
    {
        log::warn!("Failed to queue offline status: {e}");
        return;
    }

    // Drive the connection until the broker acks the record.
    let deadline = tokio::time::Instant::now() + OFFLINE_FLUSH_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => {
                log::info!("Offline status published");
                break;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::warn!("Connection lost while flushing offline status: {e}");
                return;
            }
            Err(_) => {
                log::warn!("Timed out flushing offline status");
                return;
            }
        }
    }

    let _ = client.disconnect().await;
}
