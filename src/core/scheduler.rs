// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Broadcast scheduler: replays the simulation queue or polls the live feed,
//! classifies, and fans updates out to every connected viewer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::handle::{SchedulerHandle, SchedulerShared};
use super::{Mode, WakeReason};
use crate::alerts::{AlertSender, CooldownGate};
use crate::config::SchedulerConfig;
use crate::detection::{EngineInput, HybridEngine, Verdict};
use crate::simulation::SimItem;
use crate::streaming::{ConnectionId, ConnectionRegistry, Envelope, Viewer};
use crate::telemetry::{Reading, TelemetrySnapshot};
use crate::upstream::UpstreamGateway;

/// The single broadcast loop. Owns all loop-private state.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    alerts: Option<AlertSender>,
    alert_gate: CooldownGate,
    /// Simulated readings of the running event, for rate computation
    sim_window: VecDeque<Reading>,
    /// Live snapshot with the running event's metric updates applied
    sim_telemetry: Option<TelemetrySnapshot>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, engine: HybridEngine, gateway: Arc<dyn UpstreamGateway>) -> Self {
        let alert_gate = CooldownGate::new(config.alert_cooldown());
        Self {
            shared: Arc::new(SchedulerShared::new(config, engine, gateway)),
            alerts: None,
            alert_gate,
            sim_window: VecDeque::new(),
            sim_telemetry: None,
        }
    }

    /// Send warning verdicts raised during simulation to this queue
    pub fn with_alerts(mut self, alerts: AlertSender) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run until shutdown. Upstream and delivery failures never end the loop.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Broadcast scheduler started");

        loop {
            tokio::select! {
                _ = self.tick() => {}
                _ = shutdown.recv() => {
                    info!("Broadcast scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) {
        if self.shared.registry.is_empty() {
            tokio::time::sleep(self.shared.config.idle_poll()).await;
            return;
        }

        match self.shared.queue.pop() {
            Some(item) => {
                self.shared.set_mode(Mode::Simulating);
                self.simulation_tick(item).await;

                if self.shared.queue.is_empty() {
                    self.finish_simulation();
                }
                tokio::time::sleep(self.shared.config.simulation_tick()).await;
            }
            None => {
                self.shared.set_mode(Mode::Live);
                self.live_tick().await;

                if self.shared.wake.wait_timeout(self.shared.config.live_wait()).await == WakeReason::Signalled {
                    debug!("Live wait cut short by wake signal");
                }
            }
        }
    }

    async fn simulation_tick(&mut self, item: SimItem) {
        let mut fanout = Fanout::new(&self.shared.registry);

        let verdict = match &item {
            SimItem::Flux(reading) => {
                // The window stays time-ordered: a reading that does not
                // advance the clock starts the next queued event
                if matches!(self.sim_window.back(), Some(last) if last.timestamp >= reading.timestamp) {
                    debug!("Simulated event boundary, resetting rate window");
                    self.sim_window.clear();
                }
                self.sim_window.push_back(reading.clone());
                while self.sim_window.len() > self.shared.config.simulation_window.max(2) {
                    self.sim_window.pop_front();
                }

                let verdict = self.shared.engine.evaluate(EngineInput::Flux(self.sim_window.make_contiguous()));
                fanout.send(Envelope::calculus(&verdict)).await;
                fanout.send(Envelope::data(reading)).await;
                verdict
            }
            SimItem::Metric(sample) => {
                let live = &self.shared.cache;
                let snapshot = self.sim_telemetry.get_or_insert_with(|| live.read().telemetry.clone());
                snapshot.merge(&sample.as_update());

                let verdict = self.shared.engine.evaluate(EngineInput::Telemetry(snapshot));
                fanout.send(Envelope::calculus(&verdict)).await;
                fanout.send(Envelope::simulated_telemetry(sample)).await;
                verdict
            }
        };

        if verdict.is_warning {
            self.raise_alert(verdict);
        }
    }

    fn finish_simulation(&mut self) {
        self.sim_window.clear();
        self.sim_telemetry = None;
        self.shared.set_mode(Mode::Live);
    }

    fn raise_alert(&mut self, verdict: Verdict) {
        let Some(alerts) = &self.alerts else {
            return;
        };

        if !self.alert_gate.try_pass(Instant::now()) {
            debug!("Alert suppressed by cool-down: {}", verdict.status.as_str());
            return;
        }

        if let Err(e) = alerts.dispatch(verdict) {
            warn!("Alert dropped: {}", e);
        }
    }

    async fn live_tick(&mut self) {
        // Viewers that register while the fetch is in flight wait for the next tick
        let mut fanout = Fanout::new(&self.shared.registry);

        let gateway = &self.shared.gateway;
        let (flux, telemetry, regions) =
            tokio::join!(gateway.fetch_flux(), gateway.fetch_telemetry(), gateway.fetch_regions());

        let window = self.shared.config.history_window;

        // Update the cache first; no lock is held across a send
        let (fresh, snapshot, regions) = {
            let mut cache = self.shared.cache.write();

            let fresh = match flux {
                Ok(readings) if !readings.is_empty() => {
                    cache.store_backlog(readings, window);
                    Some(cache.backlog.clone())
                }
                Ok(_) => {
                    warn!("Flux feed returned no readings");
                    None
                }
                Err(e) => {
                    warn!("Flux fetch failed, keeping {} cached readings: {}", cache.backlog.len(), e);
                    None
                }
            };

            if telemetry.is_empty() {
                warn!("No telemetry metric could be refreshed, keeping last values");
            }
            cache.telemetry.merge(&telemetry);

            match regions {
                Ok(regions) => cache.regions = regions,
                Err(e) => warn!("Region fetch failed, keeping {} cached regions: {}", cache.regions.len(), e),
            }

            (fresh, cache.telemetry.clone(), cache.regions.clone())
        };

        if let Some(readings) = fresh {
            let verdict = self.shared.engine.evaluate(EngineInput::Flux(&readings));
            fanout.send(Envelope::calculus(&verdict)).await;
            if let Some(latest) = readings.last() {
                fanout.send(Envelope::data(latest)).await;
            }
        }

        fanout.send(Envelope::telemetry(&snapshot)).await;
        fanout.send(Envelope::regions(&regions)).await;

        debug!("Live tick delivered to {} viewer(s)", fanout.len());
    }
}

/// Delivers one tick's messages to the viewers registered when the tick
/// began. A failed viewer is deregistered and skipped for the rest of it.
struct Fanout<'a> {
    registry: &'a ConnectionRegistry,
    viewers: Vec<Arc<dyn Viewer>>,
}

impl<'a> Fanout<'a> {
    fn new(registry: &'a ConnectionRegistry) -> Self {
        Self {
            registry,
            viewers: registry.snapshot(),
        }
    }

    fn len(&self) -> usize {
        self.viewers.len()
    }

    async fn send(&mut self, envelope: serde_json::Result<Envelope>) {
        let text = match envelope.and_then(|envelope| envelope.to_text()) {
            Ok(text) => text,
            Err(e) => {
                error!("Could not encode update: {}", e);
                return;
            }
        };

        let mut failed = Vec::new();
        for viewer in &self.viewers {
            if let Err(e) = viewer.send(&text).await {
                warn!("Dropping viewer {}: {}", viewer.id(), e);
                failed.push(viewer.clone());
            }
        }

        if failed.is_empty() {
            return;
        }
        for viewer in &failed {
            self.registry.evict(viewer).await;
        }
        let failed: Vec<ConnectionId> = failed.iter().map(|v| v.id()).collect();
        self.viewers.retain(|v| !failed.contains(&v.id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{Alert, AlertDispatcher, AlertSink};
    use crate::error::{AlertError, DeliveryError, FetchError};
    use crate::simulation::{generate, SimulationKind, SimulationRequest};
    use crate::streaming::ChannelViewer;
    use crate::telemetry::{FluxClass, SolarRegion, TelemetryHistory, TelemetryUpdate};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{mpsc, Semaphore};

    struct StubGateway {
        fail_flux: AtomicBool,
        flux_calls: AtomicUsize,
        cycles: mpsc::UnboundedSender<()>,
        /// While set, a live fetch blocks until a permit is released
        gated: AtomicBool,
        release: Semaphore,
    }

    impl StubGateway {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
            let (cycles, rx) = mpsc::unbounded_channel();
            let gateway = Arc::new(Self {
                fail_flux: AtomicBool::new(false),
                flux_calls: AtomicUsize::new(0),
                cycles,
                gated: AtomicBool::new(false),
                release: Semaphore::new(0),
            });
            (gateway, rx)
        }
    }

    #[async_trait]
    impl UpstreamGateway for StubGateway {
        async fn fetch_flux(&self) -> Result<Vec<Reading>, FetchError> {
            self.flux_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_flux.load(Ordering::SeqCst) {
                return Err(FetchError::Status {
                    url: "stub://xrays".to_string(),
                    status: 503,
                });
            }
            let t0 = Utc::now() - ChronoDuration::minutes(1);
            Ok(vec![Reading::live(t0, 1e-7), Reading::live(t0 + ChronoDuration::minutes(1), 1e-6)])
        }

        async fn fetch_telemetry(&self) -> TelemetryUpdate {
            TelemetryUpdate {
                wind_speed: Some(520.0),
                ..Default::default()
            }
        }

        // Only the live tick asks for regions, so this marks a fetch cycle
        async fn fetch_regions(&self) -> Result<Vec<SolarRegion>, FetchError> {
            let _ = self.cycles.send(());
            if self.gated.load(Ordering::SeqCst) {
                if let Ok(permit) = self.release.acquire().await {
                    permit.forget();
                }
            }
            Ok(vec![SolarRegion {
                region_number: Some(3664),
                latitude: -18.0,
                longitude: 30.0,
                class_type: "BGD".to_string(),
            }])
        }

        async fn fetch_telemetry_history(&self) -> TelemetryHistory {
            TelemetryHistory::default()
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            idle_poll_ms: 10,
            simulation_tick_ms: 5,
            live_wait_secs: 60,
            ..Default::default()
        }
    }

    fn scheduler(gateway: Arc<StubGateway>) -> Scheduler {
        Scheduler::new(test_config(), HybridEngine::default(), gateway)
    }

    async fn next_type(rx: &mut mpsc::UnboundedReceiver<String>) -> (String, Value) {
        let text = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("viewer channel closed");
        let json: Value = serde_json::from_str(&text).unwrap();
        (json["type"].as_str().unwrap().to_string(), json["payload"].clone())
    }

    async fn next_cycle(rx: &mut mpsc::UnboundedReceiver<()>, within: Duration) {
        tokio::time::timeout(within, rx.recv())
            .await
            .expect("no fetch cycle in time")
            .expect("gateway dropped");
    }

    #[tokio::test]
    async fn test_entry_snapshot_then_live_order() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        let (viewer, mut rx) = ChannelViewer::new();
        handle.connect(Arc::new(viewer)).await.unwrap();

        let (kind, payload) = next_type(&mut rx).await;
        assert_eq!(kind, "history_update");
        assert_eq!(payload["history"].as_array().unwrap().len(), 2);
        assert_eq!(next_type(&mut rx).await.0, "calculus_update");
        assert_eq!(next_type(&mut rx).await.0, "telemetry_history_update");

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        let (kind, payload) = next_type(&mut rx).await;
        assert_eq!(kind, "calculus_update");
        assert_eq!(payload["status"], "RAPID_INTENSIFICATION");
        assert_eq!(next_type(&mut rx).await.0, "data_update");
        let (kind, payload) = next_type(&mut rx).await;
        assert_eq!(kind, "telemetry_update");
        assert_eq!(payload["wind_speed"], 520.0);
        assert_eq!(payload["kp_index"], 3.0);
        let (kind, payload) = next_type(&mut rx).await;
        assert_eq!(kind, "regions_update");
        assert_eq!(payload["regions"][0]["region_number"], 3664);
    }

    #[tokio::test]
    async fn test_idle_without_viewers() {
        let (gateway, _cycles) = StubGateway::new();
        let scheduler = scheduler(gateway.clone());

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(gateway.flux_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wake_signal_preempts_live_wait() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        let (viewer, _rx) = ChannelViewer::new();
        handle.connect(Arc::new(viewer)).await.unwrap();

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        // The loop is now inside its 60 s wait
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle
            .start_simulation(&SimulationRequest::new("M", 1, SimulationKind::Flux))
            .unwrap();

        next_cycle(&mut cycles, Duration::from_secs(1)).await;
        assert_eq!(handle.queued(), 0);
        assert_eq!(handle.mode(), Mode::Live);
    }

    #[tokio::test]
    async fn test_failed_viewer_does_not_stop_fanout() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        let (healthy, mut healthy_rx) = ChannelViewer::new();
        let (broken, broken_rx) = ChannelViewer::new();
        let broken_id = broken.id();
        handle.connect(Arc::new(broken)).await.unwrap();
        handle.connect(Arc::new(healthy)).await.unwrap();
        drop(broken_rx);
        assert_eq!(handle.connection_count(), 2);

        for _ in 0..3 {
            next_type(&mut healthy_rx).await;
        }

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        let mut kinds = Vec::new();
        for _ in 0..4 {
            kinds.push(next_type(&mut healthy_rx).await.0);
        }
        assert_eq!(kinds, ["calculus_update", "data_update", "telemetry_update", "regions_update"]);
        assert_eq!(handle.connection_count(), 1);
        assert!(!handle.disconnect(broken_id));
    }

    #[tokio::test]
    async fn test_flux_failure_degrades_and_loop_continues() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway.clone());
        let handle = scheduler.handle();

        let (viewer, mut rx) = ChannelViewer::new();
        handle.connect(Arc::new(viewer)).await.unwrap();
        for _ in 0..3 {
            next_type(&mut rx).await;
        }
        gateway.fail_flux.store(true, Ordering::SeqCst);

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        // No flux messages this tick, the rest still goes out
        assert_eq!(next_type(&mut rx).await.0, "telemetry_update");
        assert_eq!(next_type(&mut rx).await.0, "regions_update");
        assert_eq!(handle.backlog().len(), 2);

        handle.shared.wake.wake();
        next_cycle(&mut cycles, Duration::from_secs(1)).await;
    }

    struct ChannelSink(mpsc::UnboundedSender<Alert>);

    #[async_trait]
    impl AlertSink for ChannelSink {
        fn name(&self) -> &str {
            "channel"
        }

        async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
            let _ = self.0.send(alert.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_simulation_replays_in_order_with_one_alert() {
        let (gateway, mut cycles) = StubGateway::new();
        let (alert_tx, mut alert_rx) = mpsc::unbounded_channel();
        let (sender, mut dispatcher) = AlertDispatcher::new(8);
        dispatcher.add_sink(Box::new(ChannelSink(alert_tx)));

        let scheduler = scheduler(gateway).with_alerts(sender);
        let handle = scheduler.handle();

        let (viewer, mut rx) = ChannelViewer::new();
        handle.connect(Arc::new(viewer)).await.unwrap();
        for _ in 0..3 {
            next_type(&mut rx).await;
        }

        let ack = handle
            .start_simulation(&SimulationRequest::new("X", 5, SimulationKind::Flux))
            .unwrap();
        assert_eq!(ack.points, 5);
        assert_eq!(handle.mode(), Mode::Simulating);

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(dispatcher.run(shutdown.resubscribe()));
        tokio::spawn(scheduler.run(shutdown));

        let mut last_timestamp = None;
        for _ in 0..5 {
            assert_eq!(next_type(&mut rx).await.0, "calculus_update");
            let (kind, payload) = next_type(&mut rx).await;
            assert_eq!(kind, "data_update");
            assert_eq!(payload["source"], "simulation");
            assert_eq!(payload["class_type"], "X");

            let ts = payload["timestamp"].as_str().unwrap().to_string();
            if let Some(prev) = &last_timestamp {
                assert!(&ts > prev);
            }
            last_timestamp = Some(ts);
        }

        next_cycle(&mut cycles, Duration::from_secs(1)).await;
        assert_eq!(handle.mode(), Mode::Live);

        let alert = tokio::time::timeout(Duration::from_secs(1), alert_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(alert.verdict.is_warning);
        assert!(alert_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_simulated_metric_updates_telemetry() {
        let (gateway, _cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        let (viewer, mut rx) = ChannelViewer::new();
        handle.connect(Arc::new(viewer)).await.unwrap();
        for _ in 0..3 {
            next_type(&mut rx).await;
        }

        handle
            .start_simulation(&SimulationRequest::new("wind", 10, SimulationKind::Wind))
            .unwrap();

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));

        let mut statuses = Vec::new();
        for _ in 0..10 {
            let (kind, verdict) = next_type(&mut rx).await;
            assert_eq!(kind, "calculus_update");
            statuses.push(verdict["status"].as_str().unwrap().to_string());

            let (kind, payload) = next_type(&mut rx).await;
            assert_eq!(kind, "telemetry_update");
            assert_eq!(payload["metric"], "wind_speed");
            assert!(payload.get("kp_index").is_none());
        }

        assert_eq!(statuses[0], "stable");
        assert_eq!(statuses[4], "FAST_SOLAR_WIND");
    }

    #[tokio::test]
    async fn test_rejected_request_enqueues_nothing() {
        let (gateway, _cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        assert!(handle
            .start_simulation(&SimulationRequest::new("Z", 10, SimulationKind::Flux))
            .is_err());
        assert_eq!(handle.queued(), 0);
        assert_eq!(handle.mode(), Mode::Live);
    }

    /// Forwards after a delay, to hold a fan-out open
    struct SlowViewer {
        inner: ChannelViewer,
        delay: Duration,
    }

    #[async_trait]
    impl Viewer for SlowViewer {
        fn id(&self) -> ConnectionId {
            self.inner.id()
        }

        async fn send(&self, text: &str) -> Result<(), DeliveryError> {
            tokio::time::sleep(self.delay).await;
            self.inner.send(text).await
        }
    }

    const LIVE_ORDER: [&str; 4] = ["calculus_update", "data_update", "telemetry_update", "regions_update"];

    async fn expect_entry_snapshot(rx: &mut mpsc::UnboundedReceiver<String>) {
        assert_eq!(next_type(rx).await.0, "history_update");
        assert_eq!(next_type(rx).await.0, "calculus_update");
        assert_eq!(next_type(rx).await.0, "telemetry_history_update");
    }

    async fn expect_live_tick(rx: &mut mpsc::UnboundedReceiver<String>) {
        for expected in LIVE_ORDER {
            assert_eq!(next_type(rx).await.0, expected);
        }
    }

    #[tokio::test]
    async fn test_viewer_joining_mid_fanout_starts_next_tick() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway);
        let handle = scheduler.handle();

        let (inner, mut slow_rx) = ChannelViewer::new();
        let slow = SlowViewer {
            inner,
            delay: Duration::from_millis(50),
        };
        handle.connect(Arc::new(slow)).await.unwrap();
        expect_entry_snapshot(&mut slow_rx).await;

        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        // The slow viewer holds this tick's fan-out open for ~200 ms
        tokio::time::sleep(Duration::from_millis(60)).await;
        let (late, mut late_rx) = ChannelViewer::new();
        handle.connect(Arc::new(late)).await.unwrap();
        expect_entry_snapshot(&mut late_rx).await;

        expect_live_tick(&mut slow_rx).await;
        assert!(late_rx.try_recv().is_err());

        handle.shared.wake.wake();
        next_cycle(&mut cycles, Duration::from_secs(1)).await;
        expect_live_tick(&mut late_rx).await;
    }

    #[tokio::test]
    async fn test_viewer_joining_during_fetch_waits_for_next_tick() {
        let (gateway, mut cycles) = StubGateway::new();
        let scheduler = scheduler(gateway.clone());
        let handle = scheduler.handle();

        let (first, mut first_rx) = ChannelViewer::new();
        handle.connect(Arc::new(first)).await.unwrap();
        expect_entry_snapshot(&mut first_rx).await;

        gateway.gated.store(true, Ordering::SeqCst);
        let (_tx, shutdown) = broadcast::channel(1);
        tokio::spawn(scheduler.run(shutdown));
        next_cycle(&mut cycles, Duration::from_secs(2)).await;

        // The tick's viewer set was fixed before the fetch began
        let (late, mut late_rx) = ChannelViewer::new();
        handle.connect(Arc::new(late)).await.unwrap();
        expect_entry_snapshot(&mut late_rx).await;

        gateway.gated.store(false, Ordering::SeqCst);
        gateway.release.add_permits(1);
        expect_live_tick(&mut first_rx).await;
        assert!(late_rx.try_recv().is_err());

        handle.shared.wake.wake();
        next_cycle(&mut cycles, Duration::from_secs(1)).await;
        expect_live_tick(&mut late_rx).await;
        expect_live_tick(&mut first_rx).await;
    }

    #[tokio::test]
    async fn test_back_to_back_events_keep_window_ordered() {
        let (gateway, _cycles) = StubGateway::new();
        let mut scheduler = scheduler(gateway);
        let (viewer, mut rx) = ChannelViewer::new();
        scheduler.shared.registry.add(Arc::new(viewer));

        // The second request was made while the first was still replaying
        let t0 = Utc::now();
        let first = SimulationRequest::new("X", 20, SimulationKind::Flux).validate(3600).unwrap();
        let second = SimulationRequest::new("M", 5, SimulationKind::Flux).validate(3600).unwrap();
        let items = generate(&first, t0)
            .into_iter()
            .chain(generate(&second, t0 + ChronoDuration::seconds(2)));

        for item in items {
            scheduler.simulation_tick(item).await;
            let window: Vec<_> = scheduler.sim_window.iter().map(|r| r.timestamp).collect();
            assert!(window.windows(2).all(|pair| pair[0] < pair[1]));
        }

        assert_eq!(scheduler.sim_window.len(), 5);
        assert!(scheduler.sim_window.iter().all(|r| r.class_type == FluxClass::M));

        let verdicts: Vec<Value> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|text| serde_json::from_str::<Value>(&text).unwrap())
            .filter(|json| json["type"] == "calculus_update")
            .map(|json| json["payload"].clone())
            .collect();
        assert_eq!(verdicts.len(), 25);
        // First reading of the second event has nothing to difference against
        assert_eq!(verdicts[20]["slope"], 0.0);
    }
}
