//! Simulation module - synthetic event sequences for demonstration

mod generator;
mod queue;

pub use generator::*;
pub use queue::SimulationQueue;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SimulationError;
use crate::telemetry::{FluxClass, MetricSample, Reading, TelemetryMetric};

/// What a simulated event perturbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationKind {
    Flux,
    Wind,
    Kp,
    Proton,
}

impl SimulationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationKind::Flux => "flux",
            SimulationKind::Wind => "wind",
            SimulationKind::Kp => "kp",
            SimulationKind::Proton => "proton",
        }
    }

    /// Telemetry metric driven by this kind, `None` for flux
    pub fn metric(&self) -> Option<TelemetryMetric> {
        match self {
            SimulationKind::Flux => None,
            SimulationKind::Wind => Some(TelemetryMetric::WindSpeed),
            SimulationKind::Kp => Some(TelemetryMetric::KpIndex),
            SimulationKind::Proton => Some(TelemetryMetric::ProtonFlux),
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flux" | "flare" => Ok(SimulationKind::Flux),
            "wind" => Ok(SimulationKind::Wind),
            "kp" => Ok(SimulationKind::Kp),
            "proton" => Ok(SimulationKind::Proton),
            _ => Err(SimulationError::UnknownKind(s.to_string())),
        }
    }
}

fn default_event_type() -> String {
    SimulationKind::Flux.as_str().to_string()
}

/// Control-plane request to start a simulated event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Flare class (C, M, X) or the metric name for telemetry kinds
    #[serde(rename = "type")]
    pub target: String,
    /// Number of ticks
    pub duration: i64,
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

impl SimulationRequest {
    pub fn new(target: &str, duration: i64, kind: SimulationKind) -> Self {
        Self {
            target: target.to_string(),
            duration,
            event_type: kind.as_str().to_string(),
        }
    }

    /// Check the request and resolve it into something the generator can run
    pub fn validate(&self, max_ticks: usize) -> Result<SimulationPlan, SimulationError> {
        let kind: SimulationKind = self.event_type.parse()?;

        let target = match kind.metric() {
            None => SimulationTarget::Flare(parse_flare_class(&self.target)?),
            Some(metric) => {
                if !names_metric(&self.target, kind) {
                    return Err(SimulationError::MetricMismatch {
                        identifier: self.target.clone(),
                        kind: kind.to_string(),
                    });
                }
                SimulationTarget::Metric(metric)
            }
        };

        if self.duration < 1 || self.duration as u64 > max_ticks as u64 {
            return Err(SimulationError::Duration {
                got: self.duration,
                max: max_ticks,
            });
        }

        Ok(SimulationPlan {
            target,
            ticks: self.duration as usize,
        })
    }
}

fn parse_flare_class(s: &str) -> Result<FluxClass, SimulationError> {
    match s.trim().to_ascii_uppercase().as_str() {
        "C" => Ok(FluxClass::C),
        "M" => Ok(FluxClass::M),
        "X" => Ok(FluxClass::X),
        _ => Err(SimulationError::UnknownClass(s.to_string())),
    }
}

fn names_metric(identifier: &str, kind: SimulationKind) -> bool {
    let id = identifier.trim().to_ascii_lowercase();
    match kind {
        SimulationKind::Wind => id == "wind" || id == "wind_speed",
        SimulationKind::Kp => id == "kp" || id == "kp_index",
        SimulationKind::Proton => id == "proton" || id == "proton_flux",
        SimulationKind::Flux => false,
    }
}

/// What a validated request will generate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationTarget {
    Flare(FluxClass),
    Metric(TelemetryMetric),
}

/// Validated simulation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationPlan {
    pub target: SimulationTarget,
    pub ticks: usize,
}

/// One pending synthetic item
#[derive(Debug, Clone, PartialEq)]
pub enum SimItem {
    Flux(Reading),
    Metric(MetricSample),
}

/// Reply to an accepted simulation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationAck {
    pub status: String,
    /// Items queued by this request
    pub points: usize,
}

impl SimulationAck {
    pub fn started(points: usize) -> Self {
        Self {
            status: "started".to_string(),
            points,
        }
    }
}
