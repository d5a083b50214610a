// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! MQTT alert recipient

use anyhow::Result;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Alert, AlertSink};
use crate::config::AlertConfig;
use crate::error::AlertError;

/// Publishes alerts as JSON on a single topic
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
    name: String,
}

impl MqttSink {
    pub async fn new(config: &AlertConfig) -> Result<Self> {
        let mut options = MqttOptions::new(&config.mqtt_client_id, &config.mqtt_broker, config.mqtt_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 16);

        // The eventloop must be polled for publishes to go out
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT alert sink connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        debug!(
            "MQTT alert sink configured for {}:{} topic {}",
            config.mqtt_broker, config.mqtt_port, config.mqtt_topic
        );

        Ok(Self {
            client,
            topic: config.mqtt_topic.clone(),
            name: format!("mqtt:{}", config.mqtt_topic),
        })
    }
}

#[async_trait]
impl AlertSink for MqttSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        let sink_error = |message: String| AlertError::Sink {
            sink: self.name.clone(),
            message,
        };

        let payload = serde_json::to_vec(alert).map_err(|e| sink_error(e.to_string()))?;

        // Fails instead of waiting when the request queue is full
        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| sink_error(format!("publish failed: {}", e)))
    }
}
