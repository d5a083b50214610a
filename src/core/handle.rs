// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Shared side of the scheduler: viewers, simulation queue, feed cache

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Mode, WakeSignal};
use crate::config::SchedulerConfig;
use crate::detection::{EngineInput, HybridEngine};
use crate::error::{DeliveryError, SimulationError};
use crate::simulation::{generate, SimulationAck, SimulationQueue, SimulationRequest};
use crate::streaming::{ConnectionId, ConnectionRegistry, Envelope, Viewer};
use crate::telemetry::{Reading, SolarRegion, TelemetryHistory, TelemetrySnapshot};
use crate::upstream::UpstreamGateway;

/// Last good values from the live feed
#[derive(Debug, Clone, Default)]
pub(crate) struct FeedCache {
    /// Rolling window of live readings, oldest first
    pub backlog: Vec<Reading>,
    pub telemetry: TelemetrySnapshot,
    pub regions: Vec<SolarRegion>,
    pub telemetry_history: TelemetryHistory,
}

impl FeedCache {
    pub fn store_backlog(&mut self, mut readings: Vec<Reading>, window: usize) {
        if readings.len() > window {
            let drain_count = readings.len() - window;
            readings.drain(0..drain_count);
        }
        self.backlog = readings;
    }

    /// Replace each series that came back non-empty
    pub fn store_history(&mut self, history: TelemetryHistory) {
        if !history.wind.is_empty() {
            self.telemetry_history.wind = history.wind;
        }
        if !history.kp.is_empty() {
            self.telemetry_history.kp = history.kp;
        }
        if !history.proton.is_empty() {
            self.telemetry_history.proton = history.proton;
        }
    }
}

pub(crate) struct SchedulerShared {
    pub config: SchedulerConfig,
    pub engine: HybridEngine,
    pub gateway: Arc<dyn UpstreamGateway>,
    pub registry: ConnectionRegistry,
    pub queue: SimulationQueue,
    pub wake: WakeSignal,
    pub cache: RwLock<FeedCache>,
    mode: watch::Sender<Mode>,
}

impl SchedulerShared {
    pub fn new(config: SchedulerConfig, engine: HybridEngine, gateway: Arc<dyn UpstreamGateway>) -> Self {
        let (mode, _) = watch::channel(Mode::Live);
        Self {
            config,
            engine,
            gateway,
            registry: ConnectionRegistry::new(),
            queue: SimulationQueue::new(),
            wake: WakeSignal::new(),
            cache: RwLock::new(FeedCache::default()),
            mode,
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        let changed = self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
        if changed {
            info!("Scheduler mode: {}", mode.as_str());
        }
    }
}

/// Cloneable entry point for the transport and control plane
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) shared: Arc<SchedulerShared>,
}

impl SchedulerHandle {
    /// Send the entry snapshot, then register the viewer for regular ticks.
    ///
    /// The snapshot goes out before registration so it always precedes
    /// the first tick message the viewer sees.
    pub async fn connect(&self, viewer: Arc<dyn Viewer>) -> Result<(), DeliveryError> {
        let backlog = self.backlog_or_fetch().await;

        viewer.send(&Envelope::history(&backlog)?.to_text()?).await?;

        if !backlog.is_empty() {
            let verdict = self.shared.engine.evaluate(EngineInput::Flux(&backlog));
            viewer.send(&Envelope::calculus(&verdict)?.to_text()?).await?;
        }

        let history = self.telemetry_history().await;
        viewer.send(&Envelope::telemetry_history(&history)?.to_text()?).await?;

        let count = self.shared.registry.add(viewer.clone());
        info!("Viewer {} connected ({} active)", viewer.id(), count);
        Ok(())
    }

    /// Deregister a viewer. Safe to call for an id that is already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.shared.registry.remove(id);
        if removed {
            info!("Viewer {} disconnected ({} active)", id, self.shared.registry.len());
        }
        removed
    }

    /// Validate, generate and enqueue a simulated event, then wake the loop
    pub fn start_simulation(&self, request: &SimulationRequest) -> Result<SimulationAck, SimulationError> {
        let plan = match request.validate(self.shared.config.max_simulation_ticks) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Rejected simulation request {:?}: {}", request, e);
                return Err(e);
            }
        };

        let items = generate(&plan, Utc::now());
        let queued = items.len();
        let pending = self.shared.queue.extend(items);
        self.shared.set_mode(Mode::Simulating);
        self.shared.wake.wake();

        info!(
            "Simulation queued: {} x{} ({}), {} item(s) pending",
            request.target, queued, request.event_type, pending
        );
        Ok(SimulationAck::started(queued))
    }

    pub fn mode(&self) -> Mode {
        *self.shared.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.shared.mode.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Simulated items still waiting to be broadcast
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn backlog(&self) -> Vec<Reading> {
        self.shared.cache.read().backlog.clone()
    }

    async fn backlog_or_fetch(&self) -> Vec<Reading> {
        let cached = self.backlog();
        if !cached.is_empty() {
            return cached;
        }

        match self.shared.gateway.fetch_flux().await {
            Ok(readings) => {
                let mut cache = self.shared.cache.write();
                cache.store_backlog(readings, self.shared.config.history_window);
                debug!("Backlog filled with {} readings", cache.backlog.len());
                cache.backlog.clone()
            }
            Err(e) => {
                warn!("Backlog fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn telemetry_history(&self) -> TelemetryHistory {
        let fresh = self.shared.gateway.fetch_telemetry_history().await;
        let mut cache = self.shared.cache.write();
        cache.store_history(fresh);
        cache.telemetry_history.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_window() {
        let mut cache = FeedCache::default();
        let start = Utc::now();
        let readings: Vec<Reading> = (0..10)
            .map(|i| Reading::live(start + chrono::Duration::minutes(i), 1e-7))
            .collect();

        cache.store_backlog(readings.clone(), 4);
        assert_eq!(cache.backlog, readings[6..].to_vec());
    }

    #[test]
    fn test_history_keeps_series_that_failed() {
        use crate::telemetry::SeriesPoint;

        let point = |v: f64| SeriesPoint {
            timestamp: "2024-05-10 12:00:00.000".to_string(),
            value: v,
        };

        let mut cache = FeedCache::default();
        cache.store_history(TelemetryHistory {
            wind: vec![point(420.0)],
            kp: vec![point(2.0)],
            proton: vec![point(0.3)],
        });
        cache.store_history(TelemetryHistory {
            wind: vec![point(510.0)],
            ..Default::default()
        });

        assert_eq!(cache.telemetry_history.wind[0].value, 510.0);
        assert_eq!(cache.telemetry_history.kp[0].value, 2.0);
        assert_eq!(cache.telemetry_history.proton[0].value, 0.3);
    }
}
