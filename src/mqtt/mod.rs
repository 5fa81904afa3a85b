pub mod client;

use rumqttc::QoS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus session closed")]
    Closed,
    #[error("bus transport error: {0}")]
    Transport(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// Outbound half of a broker session. Both calls queue the request and
/// return without waiting for the broker.
pub trait BusSession: Send + Sync {
    fn subscribe(&self, topic: &str) -> BusResult<()>;
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> BusResult<()>;
}

/// Inbound notifications from a session, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection attempt has started.
    Connecting,
    /// The broker acknowledged the connection.
    Connected,
    /// The transport dropped or failed to connect; the session retries on its own.
    ConnectionLost(String),
    Message { topic: String, payload: Vec<u8> },
}
