//! Viewer-facing message envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::detection::Verdict;
use crate::simulation::SimulationAck;
use crate::telemetry::{MetricSample, Provenance, Reading, SolarRegion, TelemetryHistory, TelemetryMetric, TelemetrySnapshot, TelemetryUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    HistoryUpdate,
    CalculusUpdate,
    DataUpdate,
    TelemetryUpdate,
    TelemetryHistoryUpdate,
    RegionsUpdate,
    SimulationAck,
    Error,
    Pong,
}

/// `{type, payload}` as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: Value,
}

/// Payload of a simulated single-metric telemetry update
#[derive(Debug, Clone, Serialize)]
struct SimulatedTelemetry {
    #[serde(flatten)]
    values: TelemetryUpdate,
    metric: TelemetryMetric,
    source: Provenance,
    timestamp: DateTime<Utc>,
}

impl Envelope {
    fn new<T: Serialize>(kind: MessageType, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn history(readings: &[Reading]) -> serde_json::Result<Self> {
        Self::new(MessageType::HistoryUpdate, &json!({ "history": readings }))
    }

    pub fn calculus(verdict: &Verdict) -> serde_json::Result<Self> {
        Self::new(MessageType::CalculusUpdate, verdict)
    }

    pub fn data(reading: &Reading) -> serde_json::Result<Self> {
        Self::new(MessageType::DataUpdate, reading)
    }

    pub fn telemetry(snapshot: &TelemetrySnapshot) -> serde_json::Result<Self> {
        Self::new(MessageType::TelemetryUpdate, snapshot)
    }

    /// Partial telemetry update tagged with the simulated metric
    pub fn simulated_telemetry(sample: &MetricSample) -> serde_json::Result<Self> {
        let payload = SimulatedTelemetry {
            values: sample.as_update(),
            metric: sample.metric,
            source: sample.source,
            timestamp: sample.timestamp,
        };
        Self::new(MessageType::TelemetryUpdate, &payload)
    }

    pub fn telemetry_history(history: &TelemetryHistory) -> serde_json::Result<Self> {
        Self::new(MessageType::TelemetryHistoryUpdate, history)
    }

    pub fn regions(regions: &[SolarRegion]) -> serde_json::Result<Self> {
        Self::new(MessageType::RegionsUpdate, &json!({ "regions": regions }))
    }

    pub fn simulation_ack(ack: &SimulationAck) -> serde_json::Result<Self> {
        Self::new(MessageType::SimulationAck, ack)
    }

    pub fn error(message: &str) -> serde_json::Result<Self> {
        Self::new(MessageType::Error, &json!({ "message": message }))
    }

    pub fn pong() -> serde_json::Result<Self> {
        Self::new(MessageType::Pong, &json!({}))
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shapes() {
        let reading = Reading::live(Utc::now(), 3e-6);

        let text = Envelope::history(&[reading.clone()]).unwrap().to_text().unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "history_update");
        assert_eq!(json["payload"]["history"][0]["class_type"], "C");

        let json = serde_json::to_value(Envelope::data(&reading).unwrap()).unwrap();
        assert_eq!(json["type"], "data_update");
        assert_eq!(json["payload"]["flux"], 3e-6);

        let json = serde_json::to_value(Envelope::regions(&[]).unwrap()).unwrap();
        assert_eq!(json["type"], "regions_update");
        assert_eq!(json["payload"]["regions"], json!([]));

        let json = serde_json::to_value(Envelope::telemetry_history(&TelemetryHistory::default()).unwrap()).unwrap();
        assert_eq!(json["type"], "telemetry_history_update");
    }

    #[test]
    fn test_simulated_telemetry_is_partial() {
        let sample = MetricSample {
            timestamp: Utc::now(),
            metric: TelemetryMetric::WindSpeed,
            value: 880.0,
            source: Provenance::Simulation,
        };
        let json = serde_json::to_value(Envelope::simulated_telemetry(&sample).unwrap()).unwrap();
        assert_eq!(json["type"], "telemetry_update");
        assert_eq!(json["payload"]["wind_speed"], 880.0);
        assert_eq!(json["payload"]["metric"], "wind_speed");
        assert_eq!(json["payload"]["source"], "simulation");
        assert!(json["payload"].get("kp_index").is_none());
    }

    #[test]
    fn test_unencodable_payload_is_an_error() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let payload: HashMap<(u8, u8), f64> = HashMap::from([((1, 2), 3.0)]);
        assert!(Envelope::new(MessageType::TelemetryUpdate, &payload).is_err());
    }
}
