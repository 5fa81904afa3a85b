use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS, Transport};
use tracing::{debug, error, info};

use crate::config::MqttConfig;
use crate::engine::SyncEngine;

use super::{BusError, BusResult, BusSession, SessionEvent};

/// Outbound handle onto the broker session. Cheap to clone.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Queue a DISCONNECT so the broker does not fire the last will.
    pub async fn disconnect(&self) -> BusResult<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BusError::Transport(e.to_string()))
    }
}

impl BusSession for MqttBus {
    fn subscribe(&self, topic: &str) -> BusResult<()> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BusError::Transport(e.to_string()))
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> BusResult<()> {
        self.client
            .try_publish(topic, qos, false, payload.to_vec())
            .map_err(|e| BusError::Transport(e.to_string()))
    }
}

/// The inbound half: owns the rumqttc event loop and reconnects forever.
pub struct MqttSession {
    eventloop: EventLoop,
    reconnect_period: Duration,
}

pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut mqttopts = MqttOptions::new(
        &config.client_id,
        &config.broker.host,
        config.broker.port,
    );
    mqttopts.set_keep_alive(config.keep_alive);
    mqttopts.set_clean_session(true);

    // MQTT 3.1.1 allows a username without a password.
    if let Some(user) = &config.username {
        mqttopts.set_credentials(user, config.password.clone().unwrap_or_default());
    }

    if config.broker.tls {
        mqttopts.set_transport(Transport::tls_with_default_config());
    }

    let lwt = LastWill::new(
        &config.last_will_topic,
        config.last_will_payload.as_bytes().to_vec(),
        QoS::AtMostOnce,
        false,
    );
    mqttopts.set_last_will(lwt);
    mqttopts
}

impl MqttSession {
    pub fn new(config: &MqttConfig) -> (MqttBus, Self) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), 100);
        (
            MqttBus { client },
            Self {
                eventloop,
                reconnect_period: config.reconnect_period,
            },
        )
    }

    /// Drive the session, feeding every connection change and inbound
    /// publish to the engine. Never returns; abort the task to stop it.
    pub async fn run(mut self, engine: Arc<SyncEngine>) {
        engine.handle_event(SessionEvent::Connecting);

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    engine.handle_event(SessionEvent::Connected);
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    debug!("Received {} ({} bytes)", publish.topic, publish.payload.len());
                    engine.handle_event(SessionEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}. Reconnecting...", e);
                    engine.handle_event(SessionEvent::ConnectionLost(e.to_string()));
                    tokio::time::sleep(self.reconnect_period).await;
                    info!("Reconnecting to MQTT broker");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerUrl, Config, DeviceBinding};

    fn config() -> MqttConfig {
        Config::from_json_str(
            r#"{
                "url": "mqtt://127.0.0.1:1",
                "username": "user",
                "password": "secret",
                "topics": {"statusGet": "stat/sonoff/POWER"}
            }"#,
        )
        .expect("valid config")
        .mqtt
    }

    #[test]
    fn options_follow_config() {
        let config = config();
        let opts = mqtt_options(&config);
        assert_eq!(opts.broker_address(), ("127.0.0.1".to_string(), 1));
        assert_eq!(opts.keep_alive(), Duration::from_secs(10));
        assert!(opts.clean_session());
        assert_eq!(opts.credentials(), Some(("user".to_string(), "secret".to_string())));
        assert_eq!(opts.client_id(), config.client_id);

        let will = opts.last_will().expect("last will set");
        assert_eq!(will.topic, "WillMsg");
        assert_eq!(&will.message[..], b"Connection Closed abnormally..!");
        assert!(!will.retain);
    }

    #[test]
    fn username_without_password_is_kept() {
        let mut config = config();
        config.password = None;
        let opts = mqtt_options(&config);
        assert_eq!(opts.credentials(), Some(("user".to_string(), String::new())));

        config.username = None;
        let opts = mqtt_options(&config);
        assert_eq!(opts.credentials(), None);
    }

    #[test]
    fn bus_requests_queue_without_a_broker() {
        let (bus, _session) = MqttSession::new(&config());
        assert!(bus.subscribe("stat/sonoff/POWER").is_ok());
        assert!(bus.publish("cmnd/sonoff/POWER", b"ON", QoS::AtMostOnce).is_ok());
    }

    #[tokio::test]
    async fn unreachable_broker_moves_engine_back_to_connecting() {
        let mut config = config();
        config.broker = BrokerUrl {
            host: "127.0.0.1".into(),
            port: 1,
            tls: false,
            username: None,
            password: None,
        };
        config.reconnect_period = Duration::from_millis(10);

        let (bus, session) = MqttSession::new(&config);
        let engine = Arc::new(
            SyncEngine::new(
                DeviceBinding::new("stat/sonoff/POWER"),
                QoS::AtMostOnce,
                Arc::new(bus),
            )
            .expect("valid binding"),
        );

        let handle = tokio::spawn(session.run(engine.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            engine.connection_state(),
            crate::engine::ConnectionState::Connecting
        );

        // Host reads and writes stay available while the broker is down.
        engine.set_status(true);
        assert!(engine.get_detected());
        assert!(engine.get_reachable());
        handle.abort();
    }
}
