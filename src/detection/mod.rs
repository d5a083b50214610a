//! Detection module - hybrid threat classification

mod hybrid;

pub use hybrid::*;

use serde::{Deserialize, Serialize};

use crate::telemetry::{Reading, TelemetrySnapshot, M_CLASS_FLUX, X_CLASS_FLUX};

/// Early-warning rise rate, W/m² per minute
pub const DERIVATIVE_WARNING: f64 = 1e-7;
/// Falling faster than this (W/m² per minute) counts as decay
pub const DECAY_RATE: f64 = -1e-8;
/// Decay is only reported above this flux
pub const DECAY_FLOOR_FLUX: f64 = 1e-6;
/// km/s
pub const FAST_WIND_SPEED: f64 = 800.0;
/// Kp
pub const STORM_KP: f64 = 7.0;
/// pfu
pub const RADIATION_STORM_PFU: f64 = 100.0;

/// Tag identifying the engine in every verdict
pub const ENGINE_TYPE: &str = "HYBRID (Calculus + Threshold)";

/// Threat status of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatStatus {
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "X_CLASS_FLARE")]
    XClassFlare,
    #[serde(rename = "M_CLASS_FLARE")]
    MClassFlare,
    #[serde(rename = "RAPID_INTENSIFICATION")]
    RapidIntensification,
    #[serde(rename = "FAST_SOLAR_WIND")]
    FastSolarWind,
    #[serde(rename = "GEOMAGNETIC_STORM")]
    GeomagneticStorm,
    #[serde(rename = "RADIATION_STORM")]
    RadiationStorm,
}

impl ThreatStatus {
    /// Everything except the baseline is a warning
    pub fn is_warning(&self) -> bool {
        !matches!(self, ThreatStatus::Stable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Stable => "stable",
            ThreatStatus::XClassFlare => "X_CLASS_FLARE",
            ThreatStatus::MClassFlare => "M_CLASS_FLARE",
            ThreatStatus::RapidIntensification => "RAPID_INTENSIFICATION",
            ThreatStatus::FastSolarWind => "FAST_SOLAR_WIND",
            ThreatStatus::GeomagneticStorm => "GEOMAGNETIC_STORM",
            ThreatStatus::RadiationStorm => "RADIATION_STORM",
        }
    }
}

/// Result of one evaluation cycle. Recomputed every tick, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// W/m² per minute; zero for telemetry verdicts
    #[serde(rename = "slope")]
    pub rate_of_change: f64,
    pub status: ThreatStatus,
    pub details: String,
    pub is_warning: bool,
    /// Early-warning rate threshold
    pub threshold: f64,
    pub engine_type: String,
    /// Display string of the value that drove the verdict
    pub value: String,
}

impl Verdict {
    fn new(status: ThreatStatus, details: impl Into<String>, rate_of_change: f64, threshold: f64, value: String) -> Self {
        Self {
            rate_of_change,
            status,
            details: details.into(),
            is_warning: status.is_warning(),
            threshold,
            engine_type: ENGINE_TYPE.to_string(),
            value,
        }
    }
}

/// What the engine can evaluate
#[derive(Debug, Clone, Copy)]
pub enum EngineInput<'a> {
    /// Time-ordered flux readings, newest last
    Flux(&'a [Reading]),
    /// Current solar wind / geomagnetic / particle conditions
    Telemetry(&'a TelemetrySnapshot),
}

/// Classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub x_class_flux: f64,
    pub m_class_flux: f64,
    pub rapid_rise_rate: f64,
    pub decay_rate: f64,
    pub decay_floor_flux: f64,
    pub fast_wind_speed: f64,
    pub storm_kp: f64,
    pub radiation_storm_pfu: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            x_class_flux: X_CLASS_FLUX,
            m_class_flux: M_CLASS_FLUX,
            rapid_rise_rate: DERIVATIVE_WARNING,
            decay_rate: DECAY_RATE,
            decay_floor_flux: DECAY_FLOOR_FLUX,
            fast_wind_speed: FAST_WIND_SPEED,
            storm_kp: STORM_KP,
            radiation_storm_pfu: RADIATION_STORM_PFU,
        }
    }
}
