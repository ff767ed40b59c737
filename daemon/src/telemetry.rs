/// Best-effort forwarding of raw host events to an HTTP collector.
///
/// One POST per forwarded event, bounded by a timeout, never retried. The
/// request runs on its own task; its result is logged and otherwise ignored.
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TelemetryConfig;
use crate::error::{NotifierError, Result};
use crate::event::HostEvent;
use crate::outcome::{settle, Outcome, Step};

pub const SOURCE: &str = "opencode-starcraft";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub source: String,
    pub timestamp: String,
    pub event: HostEvent,
}

#[derive(Debug, Clone)]
pub struct TelemetryRequest {
    pub endpoint: String,
    pub timeout: Duration,
    pub envelope: Envelope,
}

/// Schedules delivery of one request and returns without waiting for it.
pub trait TelemetryTransport: Send + Sync {
    fn send(&self, request: TelemetryRequest) -> Result<()>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
        })
    }
}

impl TelemetryTransport for HttpTransport {
    fn send(&self, request: TelemetryRequest) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| NotifierError::NoRuntime("telemetry request"))?;
        let client = self.client.clone();
        handle.spawn(async move {
            settle(Step::Telemetry, post(&client, &request).await);
        });
        Ok(())
    }
}

/// `POST` the envelope as JSON. Non-2xx statuses count as failures.
async fn post(client: &reqwest::Client, request: &TelemetryRequest) -> Result<()> {
    let response = client
        .post(&request.endpoint)
        .timeout(request.timeout)
        .json(&request.envelope)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(NotifierError::Status {
            status: response.status().as_u16(),
            url: request.endpoint.clone(),
        });
    }
    Ok(())
}

pub struct TelemetryForwarder {
    config: TelemetryConfig,
    transport: Arc<dyn TelemetryTransport>,
}

impl TelemetryForwarder {
    pub fn new(config: TelemetryConfig, transport: Arc<dyn TelemetryTransport>) -> Self {
        Self { config, transport }
    }

    /// Hands `event` to the transport when its type is enabled. `None` means
    /// the event was not meant to be forwarded at all.
    pub fn forward(&self, event: &HostEvent) -> Option<Outcome> {
        if !self.config.forwards(&event.event_type) {
            return None;
        }
        let Some(endpoint) = self.config.endpoint.as_deref().filter(|e| !e.is_empty()) else {
            return Some(settle(Step::Telemetry, Err(NotifierError::MissingEndpoint)));
        };

        let request = TelemetryRequest {
            endpoint: endpoint.to_string(),
            timeout: Duration::from_millis(self.config.timeout_ms),
            envelope: Envelope {
                source: SOURCE.to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                event: event.clone(),
            },
        };
        Some(settle(Step::Telemetry, self.transport.send(request)))
    }
}
