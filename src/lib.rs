// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! HelioWatch - Space-Weather Threat Monitor
//!
//! Streams live NOAA space-weather data to connected viewers with:
//! - Hybrid flare classification (absolute thresholds + rate of change)
//! - Solar wind, geomagnetic and radiation storm checks
//! - Deterministic simulated events for demonstration
//! - Webhook and MQTT alerting
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    HelioWatch Server                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌───────────┐            │
//! │  │ Upstream │ → │ Scheduler │ → │ Detection │            │
//! │  │ (NOAA)   │   │ live/sim  │   │ (hybrid)  │            │
//! │  └──────────┘   └───────────┘   └───────────┘            │
//! │                   ↑       ↓            ↓                 │
//! │  ┌────────────┐   │  ┌───────────┐  ┌────────┐           │
//! │  │ Simulation │ ──┘  │ Streaming │  │ Alerts │           │
//! │  │ queue      │      │ viewers   │  │        │           │
//! │  └────────────┘      └───────────┘  └────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod alerts;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod simulation;
pub mod streaming;
pub mod telemetry;
pub mod upstream;

// Re-exports for convenience
pub use config::Config;
pub use core::{Mode, Scheduler, SchedulerHandle};
pub use detection::{HybridEngine, ThreatStatus, Verdict};
pub use simulation::{SimulationAck, SimulationRequest};
pub use streaming::{ChannelViewer, Envelope, Viewer, WebSocketServer};
pub use upstream::{NoaaGateway, UpstreamGateway};

/// HelioWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HelioWatch name
pub const NAME: &str = "HelioWatch";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "mqtt")]
    features.push("mqtt".to_string());

    features
}
