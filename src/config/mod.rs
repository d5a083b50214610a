// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::detection::Thresholds;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level used when no CLI flag overrides it
    pub log_level: String,

    /// Broadcast loop timing
    pub scheduler: SchedulerConfig,

    /// Classification thresholds
    pub detection: Thresholds,

    /// Data provider endpoints
    pub upstream: UpstreamConfig,

    /// Viewer WebSocket server
    pub streaming: StreamingConfig,

    /// Out-of-band alerting
    pub alerts: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "HelioWatch".to_string(),
            log_level: "info".to_string(),
            scheduler: SchedulerConfig::default(),
            detection: Thresholds::default(),
            upstream: UpstreamConfig::default(),
            streaming: StreamingConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("heliowatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Broadcast scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Re-check interval while nobody is connected
    pub idle_poll_ms: u64,

    /// Pacing between simulated ticks
    pub simulation_tick_ms: u64,

    /// Longest wait between live fetch cycles
    pub live_wait_secs: u64,

    /// Minimum gap between two simulation alerts
    pub alert_cooldown_secs: u64,

    /// Live readings kept as the viewer backlog
    pub history_window: usize,

    /// Simulated readings kept for rate computation
    pub simulation_window: usize,

    /// Longest accepted simulation, in ticks
    pub max_simulation_ticks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 1000,
            simulation_tick_ms: 100,
            live_wait_secs: 60,
            alert_cooldown_secs: 10,
            history_window: 1440,
            simulation_window: 120,
            max_simulation_ticks: 3600,
        }
    }
}

impl SchedulerConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn simulation_tick(&self) -> Duration {
        Duration::from_millis(self.simulation_tick_ms)
    }

    pub fn live_wait(&self) -> Duration {
        Duration::from_secs(self.live_wait_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }
}

/// NOAA SWPC endpoints and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// GOES X-ray flux, 3 days
    pub xray_url: String,

    /// Solar wind plasma, 5 minutes
    pub plasma_url: String,

    /// Solar wind plasma, 1 day
    pub plasma_history_url: String,

    /// Planetary K index
    pub kp_url: String,

    /// GOES integral protons, 1 day
    pub proton_url: String,

    /// Active regions
    pub regions_url: String,

    /// Timeout for flux, region and history requests
    pub request_timeout_ms: u64,

    /// Timeout for each of the per-metric telemetry requests
    pub telemetry_timeout_ms: u64,

    /// Most recent readings kept from the flux feed
    pub max_readings: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            xray_url: "https://services.swpc.noaa.gov/json/goes/primary/xrays-3-day.json".to_string(),
            plasma_url: "https://services.swpc.noaa.gov/products/solar-wind/plasma-5-minute.json".to_string(),
            plasma_history_url: "https://services.swpc.noaa.gov/products/solar-wind/plasma-1-day.json".to_string(),
            kp_url: "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json".to_string(),
            proton_url: "https://services.swpc.noaa.gov/json/goes/primary/integral-protons-1-day.json".to_string(),
            regions_url: "https://services.swpc.noaa.gov/json/solar_regions.json".to_string(),
            request_timeout_ms: 5000,
            telemetry_timeout_ms: 2000,
            max_readings: 1440,
        }
    }
}

/// Viewer streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub bind_address: String,
    pub websocket_port: u16,
    pub max_clients: usize,

    /// A viewer that cannot take a message within this time is dropped
    pub send_timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            websocket_port: 8000,
            max_clients: 64,
            send_timeout_ms: 2000,
        }
    }
}

/// Alert dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,

    /// Alerts waiting for the dispatcher; extra alerts are dropped
    pub queue_capacity: usize,

    /// MQTT recipient
    pub mqtt_enabled: bool,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_topic: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,

    /// HTTP recipients, each receives the alert as a JSON POST
    pub webhook_urls: Vec<String>,
    pub webhook_timeout_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 32,
            mqtt_enabled: false,
            mqtt_broker: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "heliowatch".to_string(),
            mqtt_topic: "heliowatch/alerts".to_string(),
            mqtt_username: None,
            mqtt_password: None,
            webhook_urls: Vec::new(),
            webhook_timeout_ms: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [scheduler]
            live_wait_secs = 30

            [alerts]
            webhook_urls = ["http://localhost:9000/hook"]
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scheduler.live_wait(), Duration::from_secs(30));
        assert_eq!(config.scheduler.simulation_tick_ms, 100);
        assert_eq!(config.scheduler.alert_cooldown(), Duration::from_secs(10));
        assert_eq!(config.alerts.webhook_urls.len(), 1);
        assert_eq!(config.detection, Thresholds::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.streaming.websocket_port, 8000);
        assert_eq!(back.upstream.xray_url, config.upstream.xray_url);
    }
}
