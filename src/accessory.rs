//! Host-facing view of the sensor.
//!
//! A home-automation host registers the services returned by
//! [`MotionSensorAccessory::services`] and wires each characteristic to the
//! matching callback accessor. Every accessor completes immediately from
//! local state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AccessoryInfo;
use crate::engine::SyncEngine;
use crate::sensor::DeviceSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicKind {
    Name,
    Manufacturer,
    Model,
    SerialNumber,
    /// Read/write boolean backed by the detected state.
    MotionDetected,
    /// Read-only boolean backed by the reachable state.
    StatusActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    AccessoryInformation,
    MotionSensor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub name: String,
    pub characteristics: Vec<CharacteristicKind>,
}

#[derive(Clone)]
pub struct MotionSensorAccessory {
    engine: Arc<SyncEngine>,
}

impl MotionSensorAccessory {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    pub fn information(&self) -> &AccessoryInfo {
        &self.engine.binding().info
    }

    /// StatusActive is only offered when an activity topic is configured.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        let info = self.information();
        let mut characteristics = vec![CharacteristicKind::MotionDetected];
        if self.engine.binding().activity.is_some() {
            characteristics.push(CharacteristicKind::StatusActive);
        }

        vec![
            ServiceDescriptor {
                kind: ServiceKind::AccessoryInformation,
                name: info.name.clone(),
                characteristics: vec![
                    CharacteristicKind::Name,
                    CharacteristicKind::Manufacturer,
                    CharacteristicKind::Model,
                    CharacteristicKind::SerialNumber,
                ],
            },
            ServiceDescriptor {
                kind: ServiceKind::MotionSensor,
                name: info.name.clone(),
                characteristics,
            },
        ]
    }

    pub fn get_detected<F: FnOnce(bool)>(&self, callback: F) {
        callback(self.engine.get_detected());
    }

    pub fn set_detected<F: FnOnce()>(&self, value: bool, callback: F) {
        self.engine.set_status(value);
        callback();
    }

    pub fn get_reachable<F: FnOnce(bool)>(&self, callback: F) {
        callback(self.engine.get_reachable());
    }

    /// Push-style alternative to polling the getters.
    pub fn watch(&self) -> watch::Receiver<DeviceSnapshot> {
        self.engine.subscribe_changes()
    }
}
