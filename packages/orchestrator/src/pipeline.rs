//! One scrape cycle: fetch, extract, normalize, filter, dedupe.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use traffic_monitor_dedupe::{Fingerprinter, dedupe};
use traffic_monitor_normalize::{DiscardReason, Normalizer, Vocabulary, netherlands};
use traffic_monitor_scraper::fetch::{HttpFetcher, SourceFetcher};
use traffic_monitor_scraper::{Extractor, FetchError, StrategyReport};
use traffic_monitor_traffic_models::{
    Normalized, RoadCode, ScrapeCycleResult, SpeedCameraSighting, TrafficDisruption,
};

use crate::CycleFailure;
use crate::config::{DEFAULT_FETCH_TIMEOUT, RefreshConfig};

/// Records produced by a successful cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    /// Deduplicated disruptions, in discovery order.
    pub jams: Vec<TrafficDisruption>,
    /// Deduplicated camera sightings, in discovery order.
    pub cameras: Vec<SpeedCameraSighting>,
    /// Per-strategy outcomes.
    pub strategies: Vec<StrategyReport>,
    /// Candidates dropped during normalization, per reason.
    pub discarded: BTreeMap<DiscardReason, usize>,
    /// Records dropped because their road is not watched.
    pub off_watch_list: usize,
}

/// The fetch-to-dedupe chain, without any shared state.
pub struct Pipeline {
    fetcher: Arc<dyn SourceFetcher>,
    extractor: Arc<Extractor>,
    normalizer: Normalizer,
    watch_roads: Vec<RoadCode>,
    fetch_timeout: Duration,
}

impl Pipeline {
    /// Creates a pipeline over a fetcher with the default strategies and
    /// vocabulary.
    #[must_use]
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(Extractor::default()),
            normalizer: Normalizer::default(),
            watch_roads: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Creates an HTTP pipeline from the refresh configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be built.
    pub fn from_config(config: &RefreshConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.fetch_config())?;
        Ok(Self::configured(Arc::new(fetcher), config))
    }

    /// Creates a pipeline over `fetcher` with the watch list, fingerprint
    /// precision and fetch timeout taken from `config`.
    #[must_use]
    pub fn configured(fetcher: Arc<dyn SourceFetcher>, config: &RefreshConfig) -> Self {
        Self::new(fetcher)
            .with_normalizer(Normalizer::new(
                netherlands(),
                Fingerprinter::new(config.anchor_precision),
            ))
            .with_watch_roads(config.watch_roads.clone())
            .with_fetch_timeout(config.fetch_timeout)
    }

    /// Replaces the extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Replaces the normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Keeps only records on these roads. Empty keeps every road.
    #[must_use]
    pub fn with_watch_roads(mut self, roads: Vec<RoadCode>) -> Self {
        self.watch_roads = roads;
        self
    }

    /// Sets the bound on the fetch step.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Where the source is fetched from.
    #[must_use]
    pub fn describe(&self) -> String {
        self.fetcher.describe()
    }

    /// Watched roads; empty means every road.
    #[must_use]
    pub fn watch_roads(&self) -> &[RoadCode] {
        &self.watch_roads
    }

    /// Vocabulary used for normalization.
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        self.normalizer.vocabulary()
    }

    /// Runs one cycle stamped with `cycle_time`.
    ///
    /// # Errors
    ///
    /// Returns [`CycleFailure`] if the fetch fails or times out, or if
    /// every extraction strategy errors.
    pub async fn run(&self, cycle_time: DateTime<Utc>) -> Result<CycleOutput, CycleFailure> {
        let source = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let extractor = Arc::clone(&self.extractor);
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&source))
            .await
            .map_err(|e| CycleFailure::Extraction(e.to_string()))?;

        if extraction.all_failed() {
            return Err(CycleFailure::AllStrategiesFailed {
                reports: extraction.reports,
            });
        }

        let batch = self.normalizer.normalize_all(&extraction, cycle_time);
        let (jams, off_jams) = self.keep_watched(batch.jams, |j| &j.road);
        let (cameras, off_cameras) = self.keep_watched(batch.cameras, |c| &c.road);
        let off_watch_list = off_jams + off_cameras;
        if off_watch_list > 0 {
            log::info!("Dropped {off_watch_list} records on unwatched roads");
        }

        let jams: Vec<TrafficDisruption> = dedupe(jams).into_iter().map(|n| n.entity).collect();
        let cameras: Vec<SpeedCameraSighting> =
            dedupe(cameras).into_iter().map(|n| n.entity).collect();

        Ok(CycleOutput {
            jams,
            cameras,
            strategies: extraction.reports,
            discarded: batch.discarded,
            off_watch_list,
        })
    }

    /// Runs one stand-alone cycle and reports it without touching any
    /// store.
    pub async fn scrape(&self) -> ScrapeCycleResult {
        let started_at = Utc::now();
        let result = self.run(started_at).await;
        let finished_at = Utc::now();

        match result {
            Ok(output) => ScrapeCycleResult {
                started_at,
                finished_at,
                success: true,
                jams: output.jams,
                cameras: output.cameras,
                error: None,
            },
            Err(failure) => ScrapeCycleResult {
                started_at,
                finished_at,
                success: false,
                jams: Vec::new(),
                cameras: Vec::new(),
                error: Some(failure.to_string()),
            },
        }
    }

    fn keep_watched<T>(
        &self,
        items: Vec<Normalized<T>>,
        road: impl Fn(&T) -> &RoadCode,
    ) -> (Vec<Normalized<T>>, usize) {
        if self.watch_roads.is_empty() {
            return (items, 0);
        }
        let total = items.len();
        let kept: Vec<Normalized<T>> = items
            .into_iter()
            .filter(|item| self.watch_roads.contains(road(&item.entity)))
            .collect();
        let dropped = total - kept.len();
        (kept, dropped)
    }
}
