/// Notification channel adapters.
///
/// The monitor hands every fired alert to a [`NotificationChannel`]. Delivery
/// is a side effect: a failed dispatch is reported back to the caller but
/// never changes the decision that was made.
///
/// Adapters:
/// - `LogChannel`    — writes the alert to the service log
/// - `PubSubChannel` — publishes a Pub/Sub style envelope over HTTPS, with
///                     the JSON payload base64-encoded in `data`

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::{ChannelConfig, ChannelKind};
use crate::model::{HazardError, MonitorType};

pub trait NotificationChannel: Send + Sync {
    fn dispatch(&self, kind: MonitorType, payload: &Value) -> Result<(), HazardError>;
}

/// Logs alerts at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn dispatch(&self, kind: MonitorType, payload: &Value) -> Result<(), HazardError> {
        let title = payload.get("title").and_then(Value::as_str).unwrap_or("hazard alert");
        let body = payload.get("body").and_then(Value::as_str).unwrap_or_default();
        log::warn!("🚨 [{}] {} - {}", kind, title, body);
        Ok(())
    }
}

/// Publishes alerts to a Pub/Sub `:publish` endpoint.
pub struct PubSubChannel {
    client: reqwest::blocking::Client,
    url: String,
    token: Option<String>,
}

impl PubSubChannel {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, HazardError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HazardError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

/// Builds the publish request body for one alert.
pub fn pubsub_envelope(kind: MonitorType, payload: &Value) -> Value {
    let data = STANDARD.encode(payload.to_string());
    let level = payload.get("level").and_then(Value::as_str).unwrap_or("unknown");
    json!({
        "messages": [{
            "data": data,
            "attributes": {
                "type": kind.as_str(),
                "level": level,
            }
        }]
    })
}

impl NotificationChannel for PubSubChannel {
    fn dispatch(&self, kind: MonitorType, payload: &Value) -> Result<(), HazardError> {
        let mut request = self.client.post(&self.url).json(&pubsub_envelope(kind, payload));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| HazardError::Dispatch(format!("publish failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(HazardError::Dispatch(format!("publish returned HTTP {}", response.status())));
        }
        Ok(())
    }
}

/// Expands `{topic}` in a publish URL template.
///
/// # Errors
/// `HazardError::Configuration` when the template names a topic but none is
/// configured.
pub fn publish_url(template: &str, topic: Option<&str>) -> Result<String, HazardError> {
    if !template.contains("{topic}") {
        return Ok(template.to_string());
    }
    let topic = topic.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        HazardError::Configuration("channel.url contains {topic} but channel.topic is not set".into())
    })?;
    Ok(template.replace("{topic}", &urlencoding::encode(topic)))
}

/// Builds the channel described by `[channel]`.
///
/// `HAZMON_CHANNEL_TOKEN` overrides the configured token so secrets can
/// stay out of the config file.
pub fn channel_from_config(
    config: &ChannelConfig,
    timeout: Duration,
) -> Result<Box<dyn NotificationChannel>, HazardError> {
    match config.kind {
        ChannelKind::Log => Ok(Box::new(LogChannel)),
        ChannelKind::PubSub => {
            let template = config.url.as_deref().ok_or_else(|| {
                HazardError::Configuration("channel.url is required for kind = \"pubsub\"".into())
            })?;
            let url = publish_url(template, config.topic.as_deref())?;
            let token = std::env::var("HAZMON_CHANNEL_TOKEN").ok().or_else(|| config.token.clone());
            Ok(Box::new(PubSubChannel::new(url, token, timeout)?))
        }
    }
}
