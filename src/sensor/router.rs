use serde_json::Value;
use thiserror::Error;

use crate::config::DeviceBinding;

use super::UpdateEvent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },
}

/// Maps inbound (topic, payload) pairs onto state updates. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    status_topic: String,
    state_topic: Option<String>,
    activity_topic: Option<String>,
    on_token: String,
    power_field: String,
    activity_token: Option<String>,
}

impl TopicRouter {
    pub fn new(binding: &DeviceBinding) -> Self {
        Self {
            status_topic: binding.status_topic.clone(),
            state_topic: binding.state_topic.clone(),
            activity_topic: binding.activity.as_ref().map(|a| a.topic.clone()),
            on_token: binding.on_token.clone(),
            power_field: binding.power_field.clone(),
            activity_token: binding.activity.as_ref().map(|a| a.token.clone()),
        }
    }

    /// Route one message. `Ok(None)` covers unknown topics and state
    /// objects without the power field.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Option<UpdateEvent>, RouteError> {
        if topic == self.status_topic {
            let status = String::from_utf8_lossy(payload);
            return Ok(Some(UpdateEvent::DetectedChanged(status == self.on_token)));
        }

        if self.state_topic.as_deref() == Some(topic) {
            return self.route_state(topic, payload);
        }

        if self.activity_topic.as_deref() == Some(topic) {
            let status = String::from_utf8_lossy(payload);
            let reachable = self.activity_token.as_deref() == Some(status.as_ref());
            return Ok(Some(UpdateEvent::ReachableChanged(reachable)));
        }

        Ok(None)
    }

    fn route_state(&self, topic: &str, payload: &[u8]) -> Result<Option<UpdateEvent>, RouteError> {
        let malformed = |reason: String| RouteError::MalformedPayload {
            topic: topic.to_string(),
            reason,
        };

        let data: Value = serde_json::from_slice(payload).map_err(|e| malformed(e.to_string()))?;
        let Some(object) = data.as_object() else {
            return Err(malformed(format!("expected a JSON object, got {data}")));
        };

        let Some(power) = object.get(&self.power_field) else {
            return Ok(None);
        };
        let detected = match power {
            Value::String(s) => *s == self.on_token,
            // Tasmota sometimes reports numeric states; compare the JSON text.
            other => other.to_string() == self.on_token,
        };
        Ok(Some(UpdateEvent::DetectedChanged(detected)))
    }
}
