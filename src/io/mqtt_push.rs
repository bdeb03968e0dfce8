//! MQTT publisher for per-user ride events
//!
//! Each authenticated user owns one logical channel, addressed by user
//! identity: events for user `u1` are published to `{prefix}/u1`. Clients
//! subscribe to their own topic on the embedded broker.
//!
//! Routine telemetry goes out at QoS 0; emergency events at QoS 1.

use crate::infra::config::Config;
use crate::io::notify::PushEnvelope;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// MQTT push publisher actor
///
/// Receives envelopes from the push channel and publishes each to the
/// owning user's topic.
pub struct MqttPusher {
    client: AsyncClient,
    rx: mpsc::Receiver<PushEnvelope>,
    topic_prefix: String,
}

impl MqttPusher {
    /// Create a new publisher connected to the configured broker
    pub fn new(config: &Config, rx: mpsc::Receiver<PushEnvelope>) -> Self {
        let client_id = format!("{}-push-{}", config.service_id(), std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, config.push_host(), config.push_port());
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (config.push_username(), config.push_password()) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);

        // Spawn the eventloop handler
        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("push_mqtt_connected");
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        debug!("push_mqtt_puback");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "push_mqtt_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, rx, topic_prefix: config.push_topic_prefix().to_string() }
    }

    /// Run the publisher loop until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(topic_prefix = %self.topic_prefix, "push_publisher_started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("push_publisher_shutdown");
                        // Drain remaining envelopes
                        while let Ok(envelope) = self.rx.try_recv() {
                            self.publish_envelope(envelope).await;
                        }
                        return;
                    }
                }
                Some(envelope) = self.rx.recv() => {
                    self.publish_envelope(envelope).await;
                }
            }
        }
    }

    async fn publish_envelope(&self, envelope: PushEnvelope) {
        let topic = format!("{}/{}", self.topic_prefix, envelope.user);
        let qos = if envelope.event.is_emergency() { QoS::AtLeastOnce } else { QoS::AtMostOnce };

        let Ok(json) = serde_json::to_string(&envelope.event) else {
            error!(user = %envelope.user, event = %envelope.event.name(), "push_serialize_failed");
            return;
        };

        // Delivery failures are telemetry, never surfaced to callers
        if let Err(e) = self.client.publish(&topic, qos, false, json.as_bytes()).await {
            debug!(error = %e, topic = %topic, "push_publish_failed");
        }
    }
}
