// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Hybrid engine: absolute thresholds for confirmed events, layered with a
//! rate-of-change check for early warning.

use crate::telemetry::{Reading, TelemetrySnapshot};

use super::{EngineInput, ThreatStatus, Thresholds, Verdict};

/// Hybrid threat classifier
#[derive(Debug, Clone, Default)]
pub struct HybridEngine {
    thresholds: Thresholds,
}

impl HybridEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a flux window or a telemetry snapshot
    pub fn evaluate(&self, input: EngineInput<'_>) -> Verdict {
        match input {
            EngineInput::Flux(points) => self.evaluate_flux(points),
            EngineInput::Telemetry(snapshot) => self.evaluate_telemetry(snapshot),
        }
    }

    /// Slope between the two newest readings in W/m² per minute.
    ///
    /// Zero with fewer than two points or when no time has elapsed between
    /// them. Spacing is taken from the timestamps, never assumed uniform.
    pub fn rate_of_change(points: &[Reading]) -> f64 {
        let [.., previous, latest] = points else {
            return 0.0;
        };

        let elapsed_ms = (latest.timestamp - previous.timestamp).num_milliseconds();
        if elapsed_ms <= 0 {
            return 0.0;
        }

        let minutes = elapsed_ms as f64 / 60_000.0;
        (latest.flux - previous.flux) / minutes
    }

    fn evaluate_flux(&self, points: &[Reading]) -> Verdict {
        let t = &self.thresholds;

        let Some(latest) = points.last() else {
            return Verdict::new(ThreatStatus::Stable, "no data", 0.0, t.rapid_rise_rate, "--".to_string());
        };

        let flux = latest.flux;
        let rate = Self::rate_of_change(points);
        let value = format!("{:.2e} W/m²", flux);

        // First match wins: absolute levels dominate the rate checks.
        let (status, details) = if flux >= t.x_class_flux {
            (ThreatStatus::XClassFlare, "major event in progress")
        } else if flux >= t.m_class_flux {
            (ThreatStatus::MClassFlare, "moderate flare ongoing")
        } else if rate > t.rapid_rise_rate {
            (ThreatStatus::RapidIntensification, "early warning: flux rising fast")
        } else if rate < t.decay_rate && flux > t.decay_floor_flux {
            (ThreatStatus::Stable, "decaying")
        } else {
            (ThreatStatus::Stable, "calm")
        };

        Verdict::new(status, details, rate, t.rapid_rise_rate, value)
    }

    fn evaluate_telemetry(&self, snapshot: &TelemetrySnapshot) -> Verdict {
        let t = &self.thresholds;

        let (status, details, value) = if snapshot.wind_speed > t.fast_wind_speed {
            (
                ThreatStatus::FastSolarWind,
                format!("solar wind at {:.0} km/s", snapshot.wind_speed),
                format!("{:.0} km/s", snapshot.wind_speed),
            )
        } else if snapshot.geomagnetic_index >= t.storm_kp {
            (
                ThreatStatus::GeomagneticStorm,
                format!("geomagnetic storm, Kp {:.1}", snapshot.geomagnetic_index),
                format!("Kp {:.1}", snapshot.geomagnetic_index),
            )
        } else if snapshot.proton_flux >= t.radiation_storm_pfu {
            (
                ThreatStatus::RadiationStorm,
                format!("proton flux at {:.1} pfu", snapshot.proton_flux),
                format!("{:.1} pfu", snapshot.proton_flux),
            )
        } else {
            (
                ThreatStatus::Stable,
                format!(
                    "calm: wind {:.0} km/s, Kp {:.1}, protons {:.1} pfu",
                    snapshot.wind_speed, snapshot.geomagnetic_index, snapshot.proton_flux
                ),
                format!("{:.0} km/s", snapshot.wind_speed),
            )
        };

        Verdict::new(status, details, 0.0, t.rapid_rise_rate, value)
    }
}
