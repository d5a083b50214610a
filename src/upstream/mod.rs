//! Upstream module - space-weather data provider

mod noaa;

pub use noaa::NoaaGateway;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::telemetry::{Reading, SolarRegion, TelemetryHistory, TelemetryUpdate};

/// Source of live readings.
///
/// Every call must finish in bounded time. The two telemetry calls are
/// best-effort and never fail: metrics or series that could not be
/// fetched are simply absent.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// Recent flux readings, oldest first
    async fn fetch_flux(&self) -> Result<Vec<Reading>, FetchError>;

    /// Freshest value of each telemetry metric that could be fetched
    async fn fetch_telemetry(&self) -> TelemetryUpdate;

    /// Active sunspot regions
    async fn fetch_regions(&self) -> Result<Vec<SolarRegion>, FetchError>;

    /// Per-metric series for graph backfill
    async fn fetch_telemetry_history(&self) -> TelemetryHistory;
}
