// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Deterministic event generator for demo/testing

use chrono::{DateTime, Duration, Utc};

use super::{SimItem, SimulationPlan, SimulationTarget};
use crate::telemetry::{FluxClass, MetricSample, Provenance, Reading, TelemetryMetric};

/// Quiet-sun X-ray flux, W/m²
pub const QUIET_FLUX: f64 = 1e-7;

/// Peak amplitude of the per-tick perturbation, as a fraction of the value
const PERTURBATION: f64 = 0.05;

/// Share of the event spent rising for flares (fast rise, slow decay)
const FLARE_RISE: f64 = 0.2;

/// Share spent rising for wind/Kp/protons, which build up more slowly
const METRIC_RISE: f64 = 0.4;

/// Rise/decay envelope of one simulated event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventProfile {
    pub baseline: f64,
    pub peak: f64,
    pub rise_fraction: f64,
}

impl EventProfile {
    pub fn for_target(target: SimulationTarget) -> Self {
        match target {
            SimulationTarget::Flare(class) => Self {
                baseline: QUIET_FLUX,
                peak: flare_peak(class),
                rise_fraction: FLARE_RISE,
            },
            SimulationTarget::Metric(metric) => {
                let (baseline, peak) = match metric {
                    TelemetryMetric::WindSpeed => (400.0, 900.0),
                    TelemetryMetric::KpIndex => (2.0, 8.0),
                    TelemetryMetric::ProtonFlux => (1.0, 500.0),
                };
                Self {
                    baseline,
                    peak,
                    rise_fraction: METRIC_RISE,
                }
            }
        }
    }

    /// Envelope factor in [0, 1] at tick `i` of `n`
    pub fn factor(&self, i: usize, n: usize) -> f64 {
        let progress = i as f64 / n as f64;
        if progress < self.rise_fraction {
            progress / self.rise_fraction
        } else {
            1.0 - (progress - self.rise_fraction) / (1.0 - self.rise_fraction)
        }
    }

    /// Value at tick `i` of `n`, perturbed by at most ±5% using `i` as phase
    pub fn value_at(&self, i: usize, n: usize) -> f64 {
        let value = self.baseline + (self.peak - self.baseline) * self.factor(i, n);
        value + value * PERTURBATION * (i as f64).sin()
    }
}

fn flare_peak(class: FluxClass) -> f64 {
    match class {
        FluxClass::X => 5e-4,
        FluxClass::M => 2e-5,
        FluxClass::C => 5e-6,
        FluxClass::Quiet => QUIET_FLUX,
    }
}

/// Generate one item per tick, timestamped one second apart from `start`
pub fn generate(plan: &SimulationPlan, start: DateTime<Utc>) -> Vec<SimItem> {
    let profile = EventProfile::for_target(plan.target);
    let n = plan.ticks;

    (0..n)
        .map(|i| {
            let timestamp = start + Duration::seconds(i as i64);
            let value = profile.value_at(i, n);
            match plan.target {
                SimulationTarget::Flare(class) => SimItem::Flux(Reading::simulated(timestamp, value, class)),
                SimulationTarget::Metric(metric) => SimItem::Metric(MetricSample {
                    timestamp,
                    metric,
                    value,
                    source: Provenance::Simulation,
                }),
            }
        })
        .collect()
}
