use crate::config::BrokerSettings;
use crate::pipeline::EventIngestor;
use crate::publish::{PublishError, Publisher};
use crate::sensor::SensorRole;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_QUEUE_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub fn inbound_topics() -> impl Iterator<Item = &'static str> {
    SensorRole::ALL.into_iter().map(SensorRole::topic)
}

/// Build the client pair. Nothing touches the network until the listener runs.
pub fn connect(settings: &BrokerSettings) -> (MqttPublisher, MqttListener) {
    let mut options = MqttOptions::new(settings.client_id.clone(), settings.host.clone(), settings.port);
    options.set_keep_alive(settings.keep_alive.max(Duration::from_secs(1)));
    let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
    (
        MqttPublisher {
            client: client.clone(),
        },
        MqttListener { client, eventloop },
    )
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn disconnect(&self) {
        if let Err(err) = self.client.try_disconnect() {
            debug!(error = %err, "Disconnect request not queued");
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|err| PublishError::Transport(err.to_string()))
    }
}

pub struct MqttListener {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttListener {
    /// Poll the broker forever, feeding sensor publishes into `ingestor`.
    pub async fn run(mut self, ingestor: EventIngestor) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to broker");
                    self.subscribe_all();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Err(err) = ingestor.handle_event(&publish.topic, &publish.payload) {
                        warn!(topic = %publish.topic, error = %err, "Dropping sensor event");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "Broker connection error, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn subscribe_all(&self) {
        for topic in inbound_topics() {
            match self.client.try_subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => debug!(topic, "Subscribed"),
                Err(err) => warn!(topic, error = %err, "Subscribe failed"),
            }
        }
    }
}
