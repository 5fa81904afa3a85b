use std::sync::Arc;

use parking_lot::Mutex;
use rumqttc::QoS;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DeviceBinding};
use crate::mqtt::{BusSession, SessionEvent};
use crate::sensor::{DeviceSnapshot, StateStore, TopicRouter};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

/// Keeps the local device state in step with the bus and answers host
/// queries from memory.
///
/// Session events go through [`SyncEngine::handle_event`]; host reads and
/// writes never wait on the network.
pub struct SyncEngine {
    binding: DeviceBinding,
    router: TopicRouter,
    store: StateStore,
    bus: Arc<dyn BusSession>,
    publish_qos: QoS,
    connection: Mutex<ConnectionState>,
    changes: watch::Sender<DeviceSnapshot>,
}

impl SyncEngine {
    pub fn new(
        binding: DeviceBinding,
        publish_qos: QoS,
        bus: Arc<dyn BusSession>,
    ) -> Result<Self, ConfigError> {
        binding.validate()?;

        let store = StateStore::new(binding.activity.is_some());
        let (changes, _) = watch::channel(store.snapshot());

        Ok(Self {
            router: TopicRouter::new(&binding),
            binding,
            store,
            bus,
            publish_qos,
            connection: Mutex::new(ConnectionState::Disconnected),
            changes,
        })
    }

    pub fn binding(&self) -> &DeviceBinding {
        &self.binding
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.lock()
    }

    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting => {
                self.transition(ConnectionState::Connecting);
            }
            SessionEvent::Connected => {
                if self.transition(ConnectionState::Connected) {
                    self.on_connected();
                }
            }
            SessionEvent::ConnectionLost(reason) => {
                if self.transition(ConnectionState::Connecting) {
                    warn!("Bus connection lost: {}. Keeping last known state", reason);
                }
            }
            SessionEvent::Message { topic, payload } => self.on_message(&topic, &payload),
        }
    }

    /// Move to `next` unless shutting down. Returns false when the
    /// transition was refused.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.connection.lock();
        if *state == ConnectionState::ShuttingDown {
            return false;
        }
        if *state != next {
            debug!("Connection state {:?} -> {:?}", *state, next);
        }
        *state = next;
        true
    }

    fn on_connected(&self) {
        info!("Connected to MQTT broker");

        for topic in self.binding.subscriptions() {
            match self.bus.subscribe(topic) {
                Ok(()) => debug!("Subscribed to {}", topic),
                Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
            }
        }

        // Runs on every connect: the device may have dropped transient settings.
        if let Some(startup) = &self.binding.startup {
            info!("Publishing startup command {}: {}", startup.topic, startup.payload);
            let payload = startup.payload.as_bytes();
            if let Err(e) = self.bus.publish(&startup.topic, payload, self.publish_qos) {
                warn!("Failed to publish startup command to {}: {}", startup.topic, e);
            }
        }
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        if self.connection_state() == ConnectionState::ShuttingDown {
            debug!("Dropping message on {} during shutdown", topic);
            return;
        }

        match self.router.route(topic, payload) {
            Ok(Some(event)) => {
                debug!("{}: {:?}", topic, event);
                self.store.apply(event);
                self.notify();
            }
            Ok(None) => debug!("No update from message on {}", topic),
            Err(e) => warn!("Dropping message: {}", e),
        }
    }

    fn notify(&self) {
        self.changes.send_if_modified(|current| {
            let latest = self.store.snapshot();
            let changed = *current != latest;
            *current = latest;
            changed
        });
    }

    pub fn get_detected(&self) -> bool {
        self.store.get_detected()
    }

    pub fn get_reachable(&self) -> bool {
        self.store.get_reachable()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.store.snapshot()
    }

    /// Host write: update local state first, then tell the device.
    /// A failed publish is logged and otherwise ignored.
    pub fn set_status(&self, detected: bool) {
        self.store.set_detected(detected);
        self.notify();

        if self.connection_state() == ConnectionState::ShuttingDown {
            return;
        }

        let topic = self.binding.command_topic();
        let payload = if detected {
            &self.binding.on_token
        } else {
            &self.binding.off_token
        };
        info!("Publishing {}: {}", topic, payload);
        if let Err(e) = self.bus.publish(topic, payload.as_bytes(), self.publish_qos) {
            warn!("Failed to publish {}: {}", topic, e);
        }
    }

    /// Receiver that sees every change to the host-visible state.
    pub fn subscribe_changes(&self) -> watch::Receiver<DeviceSnapshot> {
        self.changes.subscribe()
    }

    pub fn shutdown(&self) {
        let mut state = self.connection.lock();
        if *state != ConnectionState::ShuttingDown {
            info!("Sync engine shutting down");
            *state = ConnectionState::ShuttingDown;
        }
    }
}
