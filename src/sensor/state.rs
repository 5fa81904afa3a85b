use std::time::Instant;

use parking_lot::RwLock;

use super::{DeviceSnapshot, UpdateEvent};

#[derive(Debug, Clone, Copy)]
struct DeviceState {
    detected: bool,
    reachable: bool,
    last_updated: Option<Instant>,
}

/// Current device state behind a single lock, so every read sees a
/// whole write or none of it.
#[derive(Debug)]
pub struct StateStore {
    state: RwLock<DeviceState>,
    /// Without an activity topic there is no liveness signal, and the
    /// device is reported as always reachable.
    tracks_reachability: bool,
}

impl StateStore {
    pub fn new(tracks_reachability: bool) -> Self {
        Self {
            state: RwLock::new(DeviceState {
                detected: false,
                reachable: false,
                last_updated: None,
            }),
            tracks_reachability,
        }
    }

    pub fn get_detected(&self) -> bool {
        self.state.read().detected
    }

    pub fn set_detected(&self, detected: bool) {
        let mut state = self.state.write();
        state.detected = detected;
        state.last_updated = Some(Instant::now());
    }

    pub fn get_reachable(&self) -> bool {
        !self.tracks_reachability || self.state.read().reachable
    }

    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.state.write();
        state.reachable = reachable;
        state.last_updated = Some(Instant::now());
    }

    pub fn apply(&self, event: UpdateEvent) {
        match event {
            UpdateEvent::DetectedChanged(detected) => self.set_detected(detected),
            UpdateEvent::ReachableChanged(reachable) => self.set_reachable(reachable),
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let state = *self.state.read();
        DeviceSnapshot {
            detected: state.detected,
            reachable: !self.tracks_reachability || state.reachable,
        }
    }

    /// When the last write landed, if any has.
    pub fn last_updated(&self) -> Option<Instant> {
        self.state.read().last_updated
    }
}
