//! Bridges a Tasmota-style motion sensor on an MQTT broker to a
//! synchronous "detected / reachable" accessory for a home-automation host.

pub mod accessory;
pub mod config;
pub mod engine;
pub mod mqtt;
pub mod sensor;

pub use accessory::MotionSensorAccessory;
pub use config::{Config, ConfigError, DeviceBinding};
pub use engine::{ConnectionState, SyncEngine};
