//! HTTP webhook alert recipient

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::{Alert, AlertSink};
use crate::error::AlertError;

/// POSTs each alert as JSON to one URL
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    name: String,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            name: format!("webhook:{}", url),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| AlertError::Sink {
                sink: self.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AlertError::Sink {
                sink: self.name.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        Ok(())
    }
}
