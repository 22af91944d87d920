#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Refresh orchestration.
//!
//! The [`Orchestrator`] owns the cycle state machine
//! (`Idle -> Running -> Idle`) behind a single lock. A cycle can only be
//! started by claiming a [`RunGuard`], and only one guard exists at a
//! time, so at most one cycle runs per process. A trigger that arrives
//! while a cycle is running is told so and nothing is queued.
//!
//! [`spawn`] starts the scheduler task: one startup cycle, then a fixed
//! interval timer, plus a bounded channel that carries manual triggers
//! from any number of [`RefreshHandle`]s to the single consumer.
//!
//! A successful cycle replaces the store snapshot. A failed cycle leaves
//! it untouched and is recorded in the last [`CycleReport`].

pub mod config;
pub mod pipeline;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use traffic_monitor_normalize::DiscardReason;
use traffic_monitor_scraper::{FetchError, StrategyReport};
use traffic_monitor_store::SnapshotStore;
use traffic_monitor_traffic_models::Snapshot;

pub use config::RefreshConfig;
pub use pipeline::{CycleOutput, Pipeline};

/// Why a cycle did not publish a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CycleFailure {
    /// The source could not be fetched.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Every extraction strategy errored.
    #[error("All extraction strategies failed: {}", failure_summary(.reports))]
    AllStrategiesFailed {
        /// The failed strategy reports.
        reports: Vec<StrategyReport>,
    },

    /// The extraction task itself did not complete.
    #[error("Extraction task failed: {0}")]
    Extraction(String),
}

fn failure_summary(reports: &[StrategyReport]) -> String {
    reports
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.strategy)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerSource {
    /// The cycle run when the scheduler starts.
    Startup,
    /// The interval timer.
    Timer,
    /// An explicit refresh request.
    Manual,
}

/// Result of asking for a manual refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerOutcome {
    /// A cycle was started.
    Started,
    /// A cycle is already running; nothing was queued.
    AlreadyRunning,
    /// The scheduler is no longer accepting triggers.
    Unavailable,
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a trigger.
    #[default]
    Idle,
    /// A cycle is in progress.
    Running {
        /// What started it.
        trigger: TriggerSource,
        /// When it started.
        started_at: DateTime<Utc>,
    },
}

/// Summary of the last finished cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// What started the cycle.
    pub trigger: TriggerSource,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// Whether a new snapshot was published.
    pub success: bool,
    /// Failure description when `success` is `false`.
    pub error: Option<String>,
    /// Number of published disruptions.
    pub jams: usize,
    /// Number of published camera sightings.
    pub cameras: usize,
    /// Per-strategy outcomes.
    pub strategies: Vec<StrategyReport>,
    /// Candidates dropped during normalization, per reason.
    pub discarded: BTreeMap<DiscardReason, usize>,
    /// Records dropped because their road is not watched.
    pub off_watch_list: usize,
    /// Set when the snapshot was published but could not be saved.
    pub persist_error: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    last_report: Option<CycleReport>,
    completed_cycles: u64,
}

/// Runs scrape cycles against a store, one at a time.
pub struct Orchestrator {
    pipeline: Pipeline,
    store: Arc<SnapshotStore>,
    state: Mutex<State>,
}

impl Orchestrator {
    /// Creates an idle orchestrator.
    #[must_use]
    pub fn new(pipeline: Pipeline, store: Arc<SnapshotStore>) -> Self {
        Self {
            pipeline,
            store,
            state: Mutex::new(State::default()),
        }
    }

    /// The store cycles publish into.
    #[must_use]
    pub const fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// The cycle pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Report of the last finished cycle, if any.
    #[must_use]
    pub fn last_report(&self) -> Option<CycleReport> {
        self.lock().last_report.clone()
    }

    /// Number of cycles finished since start, successful or not.
    #[must_use]
    pub fn completed_cycles(&self) -> u64 {
        self.lock().completed_cycles
    }

    /// Moves to `Running` and returns the guard for the new cycle, or
    /// `None` if a cycle is already running.
    #[must_use]
    pub fn try_begin(self: &Arc<Self>, trigger: TriggerSource) -> Option<RunGuard> {
        let mut state = self.lock();
        if let Phase::Running { trigger: running, .. } = state.phase {
            log::debug!("Refresh ({trigger}) ignored: {running} cycle already running");
            return None;
        }

        let started_at = Utc::now();
        state.phase = Phase::Running {
            trigger,
            started_at,
        };
        drop(state);

        Some(RunGuard {
            orchestrator: Arc::clone(self),
            trigger,
            started_at,
            released: false,
        })
    }

    /// Runs one cycle now and waits for it. Returns `None` if a cycle is
    /// already running.
    pub async fn run_once(self: &Arc<Self>, trigger: TriggerSource) -> Option<CycleReport> {
        let guard = self.try_begin(trigger)?;
        Some(guard.run().await)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to run one cycle. Dropping it returns the
/// orchestrator to `Idle`.
pub struct RunGuard {
    orchestrator: Arc<Orchestrator>,
    trigger: TriggerSource,
    started_at: DateTime<Utc>,
    released: bool,
}

impl RunGuard {
    /// What started this cycle.
    #[must_use]
    pub const fn trigger(&self) -> TriggerSource {
        self.trigger
    }

    /// Runs the cycle, publishes on success and records the report.
    pub async fn run(mut self) -> CycleReport {
        let orchestrator = Arc::clone(&self.orchestrator);
        log::info!(
            "Starting {} refresh from {}",
            self.trigger,
            orchestrator.pipeline.describe()
        );

        let result = orchestrator.pipeline.run(self.started_at).await;

        let report = match result {
            Ok(output) => self.publish(Arc::clone(&orchestrator.store), output).await,
            Err(failure) => {
                log::error!("Refresh failed: {failure}");
                let strategies = match failure {
                    CycleFailure::AllStrategiesFailed { ref reports } => reports.clone(),
                    _ => Vec::new(),
                };
                CycleReport {
                    trigger: self.trigger,
                    started_at: self.started_at,
                    finished_at: Utc::now(),
                    success: false,
                    error: Some(failure.to_string()),
                    jams: 0,
                    cameras: 0,
                    strategies,
                    discarded: BTreeMap::new(),
                    off_watch_list: 0,
                    persist_error: None,
                }
            }
        };

        let mut state = orchestrator.lock();
        state.phase = Phase::Idle;
        state.last_report = Some(report.clone());
        state.completed_cycles += 1;
        drop(state);
        self.released = true;

        report
    }

    /// Swaps the snapshot in and writes it to disk on the blocking pool.
    async fn publish(&self, store: Arc<SnapshotStore>, output: CycleOutput) -> CycleReport {
        let jams = output.jams.len();
        let cameras = output.cameras.len();
        let snapshot = Snapshot {
            traffic_jams: output.jams,
            speed_cameras: output.cameras,
            last_updated: Some(self.started_at),
        };

        let persist_error = match tokio::task::spawn_blocking(move || store.publish(snapshot)).await
        {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                log::error!("Published snapshot could not be saved: {e}");
                Some(e.to_string())
            }
            Err(e) => {
                log::error!("Snapshot publish task failed: {e}");
                Some(e.to_string())
            }
        };

        log::info!("Refresh complete: {jams} jams, {cameras} cameras");

        CycleReport {
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: Utc::now(),
            success: true,
            error: None,
            jams,
            cameras,
            strategies: output.strategies,
            discarded: output.discarded,
            off_watch_list: output.off_watch_list,
            persist_error,
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.released {
            self.orchestrator.lock().phase = Phase::Idle;
        }
    }
}

/// Sends manual triggers to the scheduler.
#[derive(Clone)]
pub struct RefreshHandle {
    orchestrator: Arc<Orchestrator>,
    sender: mpsc::Sender<RunGuard>,
}

impl RefreshHandle {
    /// Requests an immediate cycle without waiting for it.
    #[must_use]
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.orchestrator.try_begin(TriggerSource::Manual) else {
            return TriggerOutcome::AlreadyRunning;
        };

        match self.sender.try_send(guard) {
            Ok(()) => TriggerOutcome::Started,
            Err(e) => {
                log::warn!("Refresh scheduler is not accepting triggers: {e}");
                TriggerOutcome::Unavailable
            }
        }
    }

    /// The orchestrator behind this handle.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

/// Starts the scheduler task: a startup cycle, then one cycle per
/// `interval` plus any manual triggers sent through the returned handle.
#[must_use]
pub fn spawn(orchestrator: Arc<Orchestrator>, interval: Duration) -> (RefreshHandle, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<RunGuard>(1);
    let handle = RefreshHandle {
        orchestrator: Arc::clone(&orchestrator),
        sender,
    };

    let task = tokio::spawn(async move {
        if let Some(guard) = orchestrator.try_begin(TriggerSource::Startup) {
            guard.run().await;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(guard) = orchestrator.try_begin(TriggerSource::Timer) {
                        guard.run().await;
                    }
                }
                received = receiver.recv() => {
                    let Some(guard) = received else {
                        log::info!("All refresh handles dropped, stopping scheduler");
                        break;
                    };
                    guard.run().await;
                }
            }
        }
    });

    (handle, task)
}

impl std::fmt::Debug for RunGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunGuard")
            .field("trigger", &self.trigger)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use traffic_monitor_scraper::fetch::SourceFetcher;
    use traffic_monitor_scraper::{
        ExtractError, ExtractionStrategy, Extractor, RawSource, StrategyOutput,
    };
    use traffic_monitor_traffic_models::{RoadCode, StrategyKind};

    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <article data-test-id="traffic-list-road">
          <span data-test-id="traffic-list-road-road-number">A2</span>
          <h3>Eindhoven → Weert</h3>
          <div data-test="body-text"><span>+ 12 min</span><span>3,5 km</span></div>
        </article>
        <article data-test-id="traffic-list-road">
          <span data-test-id="traffic-list-road-road-number">N69</span>
          <h3>Valkenswaard → Belgische Grens</h3>
          <div data-test="body-text"><span>+ 5 min</span><span>1 km</span></div>
        </article>
        </body></html>
    "#;

    /// Road articles with a junction item and a camera, so the structural
    /// and text strategies both report every record.
    const MIXED_PAGE: &str = r#"
        <html><body>
        <article data-test-id="traffic-list-road">
          <span data-test-id="traffic-list-road-road-number">A2</span>
          <h3>Eindhoven → Weert</h3>
          <div data-test="body-text"><span>+ 12 min</span><span>3,5 km</span></div>
        </article>
        <article data-test-id="traffic-list-road">
          <span data-test-id="traffic-list-road-road-number">A67</span>
          <h3>Eindhoven → Venlo</h3>
          <div data-test-id="traffic-list-road-traffic-item">
            <h4>knooppunt Leenderheide</h4>
            <p>Ongeval, + 20 min, 4 km</p>
          </div>
          <div data-test-id="traffic-list-road-radar-item" data-active="true">
            <h4>Geldrop</h4><p>Flitser hmp 12.3</p>
          </div>
        </article>
        </body></html>
    "#;

    fn per_road<'a>(roads: impl Iterator<Item = &'a RoadCode>) -> BTreeMap<&'a str, usize> {
        let mut counts = BTreeMap::new();
        for road in roads {
            *counts.entry(road.as_str()).or_default() += 1;
        }
        counts
    }

    /// Serves a fixed page, or fails, optionally waiting for a release.
    struct StubFetcher {
        body: Option<&'static str>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn serving(body: &'static str) -> Self {
            Self {
                body: Some(body),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(body: &'static str, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::serving(body)
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        fn describe(&self) -> String {
            "stub".to_string()
        }

        async fn fetch(&self) -> Result<RawSource, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.body.map_or_else(
                || {
                    Err(FetchError::Status {
                        status: 503,
                        url: "stub".to_string(),
                    })
                },
                |body| Ok(RawSource::new("stub", body.to_string())),
            )
        }
    }

    struct Broken;

    impl ExtractionStrategy for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Structural
        }

        fn extract(&self, _source: &RawSource) -> Result<StrategyOutput, ExtractError> {
            Err(ExtractError::Selector {
                selector: "article".to_string(),
                message: "layout changed".to_string(),
            })
        }
    }

    fn orchestrator(fetcher: StubFetcher) -> (Arc<Orchestrator>, Arc<StubFetcher>) {
        let fetcher = Arc::new(fetcher);
        let pipeline = Pipeline::new(Arc::clone(&fetcher) as Arc<dyn SourceFetcher>);
        let orchestrator = Arc::new(Orchestrator::new(
            pipeline,
            Arc::new(SnapshotStore::in_memory()),
        ));
        (orchestrator, fetcher)
    }

    #[tokio::test]
    async fn successful_cycle_publishes_snapshot() {
        let (orchestrator, _) = orchestrator(StubFetcher::serving(MIXED_PAGE));

        let report = orchestrator.run_once(TriggerSource::Manual).await.unwrap();

        assert!(report.success, "{:?}", report.error);
        let snapshot = orchestrator.store().current();
        assert_eq!(snapshot.last_updated, Some(report.started_at));
        assert!(snapshot.traffic_jams.iter().any(|j| j.road.as_str() == "A2" && j.delay_minutes == 12));
        assert!(snapshot.traffic_jams.iter().all(|j| j.last_updated == report.started_at));

        let jams = per_road(snapshot.traffic_jams.iter().map(|j| &j.road));
        assert_eq!(jams, BTreeMap::from([("A2", 1), ("A67", 1)]));
        let cameras = per_road(snapshot.speed_cameras.iter().map(|c| &c.road));
        assert_eq!(cameras, BTreeMap::from([("A67", 1)]));
        assert_eq!(report.jams, 2);
        assert_eq!(report.cameras, 1);

        let a67 = snapshot
            .traffic_jams
            .iter()
            .find(|j| j.road.as_str() == "A67")
            .unwrap();
        assert_eq!(a67.source_location, "Eindhoven");
        assert_eq!(a67.destination_location, "Venlo");
        assert_eq!(a67.route_details, "knooppunt Leenderheide");
        assert_eq!(a67.delay_minutes, 20);

        let camera = &snapshot.speed_cameras[0];
        assert_eq!(camera.location, "Geldrop");
        assert!(camera.is_active);

        let mut ids: Vec<&str> = snapshot.traffic_jams.iter().map(|j| j.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), snapshot.traffic_jams.len());

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(orchestrator.store().version(), 1);
        assert_eq!(orchestrator.last_report(), Some(report));
    }

    #[tokio::test]
    async fn link_text_naming_cameras_is_not_a_camera() {
        let (orchestrator, _) = orchestrator(StubFetcher::serving(
            r#"<html><body>
            <article data-test-id="traffic-list-road">
              <span data-test-id="traffic-list-road-road-number">A2</span>
              <h3>Eindhoven → Weert</h3>
              <div data-test="body-text"><span>+ 12 min</span><span>3,5 km</span></div>
            </article>
            <footer><a href="/verkeer/flitsers">Bekijk alle flitsers</a></footer>
            </body></html>"#,
        ));

        let report = orchestrator.run_once(TriggerSource::Manual).await.unwrap();

        assert!(report.success, "{:?}", report.error);
        let snapshot = orchestrator.store().current();
        assert!(snapshot.speed_cameras.is_empty());
        assert_eq!(per_road(snapshot.traffic_jams.iter().map(|j| &j.road)), BTreeMap::from([("A2", 1)]));
        assert_eq!(report.discarded.get(&DiscardReason::UnanchoredCamera), Some(&1));
    }

    #[tokio::test]
    async fn cycle_writes_the_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(StubFetcher::serving(PAGE));
        let orchestrator = Arc::new(Orchestrator::new(
            Pipeline::new(fetcher),
            Arc::new(SnapshotStore::open(&path).unwrap()),
        ));

        let report = orchestrator.run_once(TriggerSource::Manual).await.unwrap();

        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.persist_error, None);
        let saved: Snapshot = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, *orchestrator.store().current());
    }

    #[tokio::test]
    async fn empty_page_is_a_successful_cycle() {
        let (orchestrator, _) =
            orchestrator(StubFetcher::serving("<html><body><p>Geen files</p></body></html>"));

        let report = orchestrator.run_once(TriggerSource::Timer).await.unwrap();

        assert!(report.success);
        assert_eq!(report.jams, 0);
        let snapshot = orchestrator.store().current();
        assert!(snapshot.traffic_jams.is_empty());
        assert!(!snapshot.is_initial());
    }

    #[tokio::test]
    async fn fetch_failure_preserves_snapshot() {
        let (orchestrator, _) = orchestrator(StubFetcher::failing());
        let before = Snapshot {
            last_updated: Some(DateTime::<Utc>::UNIX_EPOCH),
            ..Snapshot::default()
        };
        orchestrator.store().publish(before).unwrap();
        let before_bytes = serde_json::to_vec(&*orchestrator.store().current()).unwrap();

        let report = orchestrator.run_once(TriggerSource::Manual).await.unwrap();

        assert!(!report.success);
        assert!(report.error.unwrap().contains("503"));
        let after_bytes = serde_json::to_vec(&*orchestrator.store().current()).unwrap();
        assert_eq!(before_bytes, after_bytes);
        assert_eq!(orchestrator.store().version(), 1);
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(orchestrator.completed_cycles(), 1);
    }

    #[tokio::test]
    async fn all_strategies_failing_is_a_failed_cycle() {
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(StubFetcher::serving(PAGE));
        let pipeline = Pipeline::new(fetcher)
            .with_extractor(Extractor::new(vec![Box::new(Broken), Box::new(Broken)]));
        let orchestrator = Arc::new(Orchestrator::new(
            pipeline,
            Arc::new(SnapshotStore::in_memory()),
        ));

        let report = orchestrator.run_once(TriggerSource::Manual).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.strategies.len(), 2);
        assert!(report.error.unwrap().contains("layout changed"));
        assert!(orchestrator.store().current().is_initial());
        assert_eq!(orchestrator.store().version(), 0);
    }

    #[tokio::test]
    async fn fetch_timeout_fails_the_cycle() {
        let gate = Arc::new(Notify::new());
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(StubFetcher::gated(PAGE, gate));
        let pipeline = Pipeline::new(fetcher).with_fetch_timeout(Duration::from_millis(20));
        let orchestrator = Arc::new(Orchestrator::new(
            pipeline,
            Arc::new(SnapshotStore::in_memory()),
        ));

        let report = orchestrator.run_once(TriggerSource::Timer).await.unwrap();

        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out"));
        assert!(orchestrator.store().current().is_initial());
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_rejected() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, fetcher) =
            orchestrator(StubFetcher::gated(PAGE, Arc::clone(&gate)));

        let first = orchestrator.try_begin(TriggerSource::Manual).unwrap();
        let running = tokio::spawn(first.run());

        assert!(matches!(orchestrator.phase(), Phase::Running { trigger: TriggerSource::Manual, .. }));
        assert!(orchestrator.try_begin(TriggerSource::Manual).is_none());
        assert!(orchestrator.run_once(TriggerSource::Timer).await.is_none());

        gate.notify_one();
        let report = running.await.unwrap();

        assert!(report.success);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.store().version(), 1);
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn scheduler_runs_startup_cycle_and_manual_triggers() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, fetcher) =
            orchestrator(StubFetcher::gated(PAGE, Arc::clone(&gate)));
        let (handle, task) = spawn(Arc::clone(&orchestrator), Duration::from_secs(3600));

        // The startup cycle holds the gate, so a manual trigger is turned away.
        while orchestrator.phase() == Phase::Idle {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.trigger(), TriggerOutcome::AlreadyRunning);

        gate.notify_one();
        while orchestrator.completed_cycles() < 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(orchestrator.last_report().unwrap().trigger, TriggerSource::Startup);

        assert_eq!(handle.trigger(), TriggerOutcome::Started);
        gate.notify_one();
        while orchestrator.completed_cycles() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(orchestrator.last_report().unwrap().trigger, TriggerSource::Manual);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.store().version(), 2);

        task.abort();
    }

    #[tokio::test]
    async fn watch_list_drops_other_roads() {
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(StubFetcher::serving(PAGE));
        let pipeline =
            Pipeline::new(fetcher).with_watch_roads(vec![RoadCode::parse("N69").unwrap()]);

        let output = pipeline.run(Utc::now()).await.unwrap();

        assert!(!output.jams.is_empty());
        assert!(output.jams.iter().all(|j| j.road.as_str() == "N69"));
        assert!(output.off_watch_list > 0);
    }

    #[tokio::test]
    async fn stand_alone_scrape_reports_failure() {
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(StubFetcher::failing());
        let result = Pipeline::new(fetcher).scrape().await;

        assert!(!result.success);
        assert!(result.jams.is_empty());
        assert!(result.error.is_some());
        assert!(result.finished_at >= result.started_at);
    }
}
