// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! NOAA SWPC JSON client

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::UpstreamGateway;
use crate::config::UpstreamConfig;
use crate::error::FetchError;
use crate::telemetry::{Reading, SeriesPoint, SolarRegion, TelemetryHistory, TelemetryUpdate};

/// Standard classification channel
const LONG_CHANNEL: &str = "0.1-0.8nm";

/// Integral proton channel used for radiation storms
const PROTON_CHANNEL: &str = ">=10 MeV";

/// Gateway backed by the public SWPC JSON products
pub struct NoaaGateway {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl NoaaGateway {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("heliowatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_json(&self, url: &str, timeout_ms: u64) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::malformed(url, e.to_string()))
    }

    async fn fetch_plasma(&self) -> Result<TelemetryUpdate, FetchError> {
        let url = &self.config.plasma_url;
        let data = self.get_json(url, self.config.telemetry_timeout_ms).await?;
        parse_plasma_latest(&data).ok_or_else(|| FetchError::malformed(url, "no plasma rows"))
    }

    async fn fetch_kp(&self) -> Result<f64, FetchError> {
        let url = &self.config.kp_url;
        let data = self.get_json(url, self.config.telemetry_timeout_ms).await?;
        parse_kp_series(&data)
            .last()
            .map(|p| p.value)
            .ok_or_else(|| FetchError::malformed(url, "no Kp rows"))
    }

    async fn fetch_protons(&self) -> Result<f64, FetchError> {
        let url = &self.config.proton_url;
        let data = self.get_json(url, self.config.telemetry_timeout_ms).await?;
        parse_proton_series(&data)
            .last()
            .map(|p| p.value)
            .ok_or_else(|| FetchError::malformed(url, "no >=10 MeV entries"))
    }
}

#[async_trait]
impl UpstreamGateway for NoaaGateway {
    async fn fetch_flux(&self) -> Result<Vec<Reading>, FetchError> {
        let url = &self.config.xray_url;
        let data = self.get_json(url, self.config.request_timeout_ms).await?;
        let readings = parse_xray(&data, self.config.max_readings).map_err(|m| FetchError::malformed(url, m))?;
        debug!("Fetched {} flux readings", readings.len());
        Ok(readings)
    }

    async fn fetch_telemetry(&self) -> TelemetryUpdate {
        let (plasma, kp, protons) = tokio::join!(self.fetch_plasma(), self.fetch_kp(), self.fetch_protons());

        let mut update = match plasma {
            Ok(update) => update,
            Err(e) => {
                warn!("Solar wind fetch failed: {}", e);
                TelemetryUpdate::default()
            }
        };

        match kp {
            Ok(kp) => update.geomagnetic_index = Some(kp),
            Err(e) => warn!("Kp fetch failed: {}", e),
        }

        match protons {
            Ok(flux) => update.proton_flux = Some(flux),
            Err(e) => warn!("Proton fetch failed: {}", e),
        }

        update
    }

    async fn fetch_regions(&self) -> Result<Vec<SolarRegion>, FetchError> {
        let url = &self.config.regions_url;
        let data = self.get_json(url, self.config.request_timeout_ms).await?;
        parse_regions(&data).map_err(|m| FetchError::malformed(url, m))
    }

    async fn fetch_telemetry_history(&self) -> TelemetryHistory {
        let timeout = self.config.request_timeout_ms;
        let (wind, kp, proton) = tokio::join!(
            self.get_json(&self.config.plasma_history_url, timeout),
            self.get_json(&self.config.kp_url, timeout),
            self.get_json(&self.config.proton_url, timeout),
        );

        let mut history = TelemetryHistory::default();

        match wind {
            Ok(data) => history.wind = parse_wind_series(&data),
            Err(e) => warn!("Wind history fetch failed: {}", e),
        }
        match kp {
            Ok(data) => history.kp = parse_kp_series(&data),
            Err(e) => warn!("Kp history fetch failed: {}", e),
        }
        match proton {
            Ok(data) => history.proton = parse_proton_series(&data),
            Err(e) => warn!("Proton history fetch failed: {}", e),
        }

        history
    }
}

/// Numbers arrive both as JSON numbers and as strings in the products feeds
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_rows(data: &Value) -> &[Value] {
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Products tables start with a header row such as `["time_tag", ...]`
fn is_header(row: &Value) -> bool {
    row.get(0)
        .and_then(Value::as_str)
        .map(|s| s.to_ascii_lowercase().contains("time"))
        .unwrap_or(false)
}

fn parse_time(tag: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(tag).ok().map(|t| t.with_timezone(&Utc))
}

/// Long-channel readings, time-ordered, newest `max` kept
pub(crate) fn parse_xray(data: &Value, max: usize) -> Result<Vec<Reading>, String> {
    let entries = data.as_array().ok_or("expected a JSON array")?;

    let mut readings: Vec<Reading> = entries
        .iter()
        .filter(|e| e.get("energy").and_then(Value::as_str) == Some(LONG_CHANNEL))
        .filter_map(|e| {
            let timestamp = parse_time(e.get("time_tag")?.as_str()?)?;
            let flux = as_number(e.get("flux")?)?;
            Some(Reading::live(timestamp, flux))
        })
        .collect();

    readings.sort_by_key(|r| r.timestamp);
    if readings.len() > max {
        let drain_count = readings.len() - max;
        readings.drain(0..drain_count);
    }
    Ok(readings)
}

/// Newest plasma row: `[time_tag, density, speed, temperature]`
pub(crate) fn parse_plasma_latest(data: &Value) -> Option<TelemetryUpdate> {
    let row = as_rows(data).iter().rev().find(|row| !is_header(row))?;
    let field = |i: usize| row.get(i).and_then(as_number);

    let update = TelemetryUpdate {
        density: field(1),
        wind_speed: field(2),
        temperature: field(3),
        ..Default::default()
    };

    (!update.is_empty()).then_some(update)
}

fn parse_wind_series(data: &Value) -> Vec<SeriesPoint> {
    as_rows(data)
        .iter()
        .filter(|row| !is_header(row))
        .filter_map(|row| {
            Some(SeriesPoint {
                timestamp: row.get(0)?.as_str()?.to_string(),
                value: as_number(row.get(2)?)?,
            })
        })
        .collect()
}

/// Kp comes either as a table (`[time_tag, Kp, ...]`) or as objects with `time_tag`/`Kp`
pub(crate) fn parse_kp_series(data: &Value) -> Vec<SeriesPoint> {
    as_rows(data)
        .iter()
        .filter(|row| !is_header(row))
        .filter_map(|row| {
            let (tag, kp) = if row.is_object() {
                (row.get("time_tag")?, row.get("Kp").or_else(|| row.get("kp_index"))?)
            } else {
                (row.get(0)?, row.get(1)?)
            };
            Some(SeriesPoint {
                timestamp: tag.as_str()?.to_string(),
                value: as_number(kp)?,
            })
        })
        .collect()
}

pub(crate) fn parse_proton_series(data: &Value) -> Vec<SeriesPoint> {
    as_rows(data)
        .iter()
        .filter(|e| e.get("energy").and_then(Value::as_str) == Some(PROTON_CHANNEL))
        .filter_map(|e| {
            Some(SeriesPoint {
                timestamp: e.get("time_tag")?.as_str()?.to_string(),
                value: as_number(e.get("flux")?)?,
            })
        })
        .collect()
}

/// Regions with a usable location
pub(crate) fn parse_regions(data: &Value) -> Result<Vec<SolarRegion>, String> {
    let entries = data.as_array().ok_or("expected a JSON array")?;

    Ok(entries
        .iter()
        .filter_map(|e| {
            let latitude = as_number(e.get("latitude")?)?;
            let longitude = as_number(e.get("longitude")?)?;
            let region_number = e
                .get("observed_region_number")
                .or_else(|| e.get("region"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            let class_type = e
                .get("magnetic_class")
                .and_then(Value::as_str)
                .unwrap_or("Alpha")
                .to_string();

            Some(SolarRegion {
                region_number,
                latitude,
                longitude,
                class_type,
            })
        })
        .collect())
}
