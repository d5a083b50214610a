//! Alerts module - out-of-band notification of warning verdicts

#[cfg(feature = "mqtt")]
mod mqtt;
mod webhook;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttSink;
pub use webhook::WebhookSink;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::detection::Verdict;
use crate::error::AlertError;

/// One alert as delivered to recipients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
}

impl Alert {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            verdict,
        }
    }
}

/// An alert recipient
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Writes alerts to the log
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        warn!(
            "ALERT {}: {} ({}) - {}",
            alert.id,
            alert.verdict.status.as_str(),
            alert.verdict.value,
            alert.verdict.details
        );
        Ok(())
    }
}

/// Producer side of the alert queue. Never blocks.
#[derive(Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<Alert>,
}

impl AlertSender {
    pub fn dispatch(&self, verdict: Verdict) -> Result<(), AlertError> {
        self.tx.try_send(Alert::new(verdict)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AlertError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AlertError::Closed,
        })
    }
}

/// Drains the alert queue into every registered sink
pub struct AlertDispatcher {
    rx: mpsc::Receiver<Alert>,
    sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(capacity: usize) -> (AlertSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (AlertSender { tx }, Self { rx, sinks: Vec::new() })
    }

    /// Dispatcher with the sinks enabled in `config`
    pub async fn from_config(config: &AlertConfig) -> Result<(AlertSender, Self)> {
        let (sender, mut dispatcher) = Self::new(config.queue_capacity);
        dispatcher.add_sink(Box::new(LogSink));

        for url in &config.webhook_urls {
            dispatcher.add_sink(Box::new(WebhookSink::new(url, Duration::from_millis(config.webhook_timeout_ms))?));
        }

        #[cfg(feature = "mqtt")]
        if config.mqtt_enabled {
            dispatcher.add_sink(Box::new(MqttSink::new(config).await?));
        }

        Ok((sender, dispatcher))
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        info!("Alert sink registered: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let Self { mut rx, sinks } = self;
        info!("Alert dispatcher started with {} sink(s)", sinks.len());

        loop {
            tokio::select! {
                alert = rx.recv() => {
                    match alert {
                        Some(alert) => deliver(&sinks, &alert).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    info!("Alert dispatcher shutting down");
                    break;
                }
            }
        }
    }
}

/// A failing sink is logged and skipped
async fn deliver(sinks: &[Box<dyn AlertSink>], alert: &Alert) {
    for sink in sinks {
        match sink.deliver(alert).await {
            Ok(()) => debug!("Alert {} delivered via {}", alert.id, sink.name()),
            Err(e) => warn!("Alert {} not delivered: {}", alert.id, e),
        }
    }
}

/// Lets at most one alert through per cool-down window
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: None }
    }

    /// True if an alert may go out at `now`; records it if so
    pub fn try_pass(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.cooldown => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
