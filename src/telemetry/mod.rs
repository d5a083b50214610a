//! Telemetry types - flux readings, solar wind/geomagnetic snapshot, regions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of the C class in W/m²
pub const C_CLASS_FLUX: f64 = 1e-6;
/// Lower bound of the M class in W/m²
pub const M_CLASS_FLUX: f64 = 1e-5;
/// Lower bound of the X class in W/m²
pub const X_CLASS_FLUX: f64 = 1e-4;

/// GOES X-ray flare class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluxClass {
    Quiet,
    C,
    M,
    X,
}

impl FluxClass {
    /// Classify a long-channel (0.1-0.8nm) flux value
    pub fn from_flux(flux: f64) -> Self {
        if flux >= X_CLASS_FLUX {
            FluxClass::X
        } else if flux >= M_CLASS_FLUX {
            FluxClass::M
        } else if flux >= C_CLASS_FLUX {
            FluxClass::C
        } else {
            FluxClass::Quiet
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FluxClass::Quiet => "Quiet",
            FluxClass::C => "C",
            FluxClass::M => "M",
            FluxClass::X => "X",
        }
    }
}

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Live,
    Simulation,
}

/// A single X-ray flux reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// W/m²
    pub flux: f64,
    pub class_type: FluxClass,
    pub source: Provenance,
}

impl Reading {
    /// Live reading, class derived from the flux magnitude
    pub fn live(timestamp: DateTime<Utc>, flux: f64) -> Self {
        Self {
            timestamp,
            flux,
            class_type: FluxClass::from_flux(flux),
            source: Provenance::Live,
        }
    }

    /// Synthetic reading labelled with the class of the simulated event
    pub fn simulated(timestamp: DateTime<Utc>, flux: f64, class_type: FluxClass) -> Self {
        Self {
            timestamp,
            flux,
            class_type,
            source: Provenance::Simulation,
        }
    }
}

/// Telemetry metrics that can be simulated individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryMetric {
    WindSpeed,
    KpIndex,
    ProtonFlux,
}

impl TelemetryMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryMetric::WindSpeed => "wind_speed",
            TelemetryMetric::KpIndex => "kp_index",
            TelemetryMetric::ProtonFlux => "proton_flux",
        }
    }
}

/// Latest known solar wind, geomagnetic and particle conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// km/s
    pub wind_speed: f64,
    /// Plasma temperature, K
    #[serde(rename = "temp")]
    pub temperature: f64,
    /// p/cm³
    pub density: f64,
    /// Planetary Kp, 0-9
    #[serde(rename = "kp_index")]
    pub geomagnetic_index: f64,
    /// >=10 MeV integral flux, pfu
    pub proton_flux: f64,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            wind_speed: 450.0,
            temperature: 100_000.0,
            density: 5.0,
            geomagnetic_index: 3.0,
            proton_flux: 10.0,
        }
    }
}

impl TelemetrySnapshot {
    /// Apply a partial update. Absent fields keep their last known value.
    pub fn merge(&mut self, update: &TelemetryUpdate) {
        if let Some(v) = update.wind_speed {
            self.wind_speed = v;
        }
        if let Some(v) = update.temperature {
            self.temperature = v;
        }
        if let Some(v) = update.density {
            self.density = v;
        }
        if let Some(v) = update.geomagnetic_index {
            self.geomagnetic_index = v;
        }
        if let Some(v) = update.proton_flux {
            self.proton_flux = v;
        }
    }
}

/// Partial telemetry; each metric is refreshed independently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, rename = "temp", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(default, rename = "kp_index", skip_serializing_if = "Option::is_none")]
    pub geomagnetic_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proton_flux: Option<f64>,
}

impl TelemetryUpdate {
    pub fn is_empty(&self) -> bool {
        self.wind_speed.is_none()
            && self.temperature.is_none()
            && self.density.is_none()
            && self.geomagnetic_index.is_none()
            && self.proton_flux.is_none()
    }
}

/// Simulated value for one telemetry metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub metric: TelemetryMetric,
    pub value: f64,
    pub source: Provenance,
}

impl MetricSample {
    /// The partial update this sample represents
    pub fn as_update(&self) -> TelemetryUpdate {
        let mut update = TelemetryUpdate::default();
        match self.metric {
            TelemetryMetric::WindSpeed => update.wind_speed = Some(self.value),
            TelemetryMetric::KpIndex => update.geomagnetic_index = Some(self.value),
            TelemetryMetric::ProtonFlux => update.proton_flux = Some(self.value),
        }
        update
    }
}

/// Active sunspot region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarRegion {
    pub region_number: Option<u32>,
    pub latitude: f64,
    pub longitude: f64,
    /// Magnetic class (Alpha, Beta, Beta-Gamma, ...)
    pub class_type: String,
}

/// One point of a telemetry time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Provider time tag, passed through as-is
    pub timestamp: String,
    pub value: f64,
}

/// Per-metric backfill used to initialise viewer graphs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryHistory {
    pub wind: Vec<SeriesPoint>,
    pub kp: Vec<SeriesPoint>,
    pub proton: Vec<SeriesPoint>,
}

impl TelemetryHistory {
    pub fn is_empty(&self) -> bool {
        self.wind.is_empty() && self.kp.is_empty() && self.proton.is_empty()
    }
}
