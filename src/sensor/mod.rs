pub mod router;
pub mod state;

pub use router::{RouteError, TopicRouter};
pub use state::StateStore;

/// A state change derived from one inbound bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    DetectedChanged(bool),
    ReachableChanged(bool),
}

/// Point-in-time view of the device, as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceSnapshot {
    pub detected: bool,
    pub reachable: bool,
}
