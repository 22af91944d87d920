//! Refresh configuration from environment variables.
//!
//! Every setting has a default. A value that is present but invalid is
//! logged and replaced by the default, so a typo never stops the service.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use traffic_monitor_dedupe::AnchorPrecision;
use traffic_monitor_scraper::fetch::{DEFAULT_SOURCE_URL, DEFAULT_USER_AGENT, FetchConfig};
use traffic_monitor_traffic_models::RoadCode;

/// Default timer cadence.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Default bound on the whole fetch step, retries included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest accepted interval or timeout. Larger values fall back to the
/// default so deadlines computed from them stay representable.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default number of retries for transient HTTP failures.
pub const DEFAULT_FETCH_RETRIES: u32 = 2;

/// Settings for the scrape cycle and its scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Page to scrape (`TRAFFIC_SOURCE_URL`).
    pub source_url: String,
    /// Timer cadence (`TRAFFIC_REFRESH_INTERVAL_SECS`).
    pub refresh_interval: Duration,
    /// Bound on the fetch step (`TRAFFIC_FETCH_TIMEOUT_SECS`).
    pub fetch_timeout: Duration,
    /// Transient retries inside the fetch step (`TRAFFIC_FETCH_RETRIES`).
    pub fetch_retries: u32,
    /// Request `User-Agent` (`TRAFFIC_USER_AGENT`).
    pub user_agent: String,
    /// Roads to keep; empty keeps every road (`TRAFFIC_WATCH_ROADS`).
    pub watch_roads: Vec<RoadCode>,
    /// Fingerprint granularity (`TRAFFIC_ANCHOR_PRECISION`).
    pub anchor_precision: AnchorPrecision,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            watch_roads: Vec::new(),
            anchor_precision: AnchorPrecision::default(),
        }
    }
}

impl RefreshConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable
    /// name to its value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_url = get("TRAFFIC_SOURCE_URL").unwrap_or(defaults.source_url);
        let user_agent = get("TRAFFIC_USER_AGENT").unwrap_or(defaults.user_agent);

        let refresh_interval = get("TRAFFIC_REFRESH_INTERVAL_SECS")
            .map_or(defaults.refresh_interval, |v| {
                seconds("TRAFFIC_REFRESH_INTERVAL_SECS", &v, defaults.refresh_interval)
            });
        let fetch_timeout = get("TRAFFIC_FETCH_TIMEOUT_SECS").map_or(defaults.fetch_timeout, |v| {
            seconds("TRAFFIC_FETCH_TIMEOUT_SECS", &v, defaults.fetch_timeout)
        });
        let fetch_retries = get("TRAFFIC_FETCH_RETRIES").map_or(defaults.fetch_retries, |v| {
            parsed("TRAFFIC_FETCH_RETRIES", &v, defaults.fetch_retries)
        });
        let anchor_precision = get("TRAFFIC_ANCHOR_PRECISION")
            .map_or(defaults.anchor_precision, |v| {
                parsed("TRAFFIC_ANCHOR_PRECISION", &v, defaults.anchor_precision)
            });
        let watch_roads = get("TRAFFIC_WATCH_ROADS").map_or(defaults.watch_roads, |v| road_list(&v));

        Self {
            source_url,
            refresh_interval,
            fetch_timeout,
            fetch_retries,
            user_agent,
            watch_roads,
            anchor_precision,
        }
    }

    /// HTTP settings for the fetcher. Each request is bounded by the same
    /// timeout as the whole fetch step.
    #[must_use]
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new(&self.source_url)
            .with_timeout(self.fetch_timeout)
            .with_max_retries(self.fetch_retries)
            .with_user_agent(&self.user_agent)
    }
}

fn parsed<T>(key: &str, value: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Invalid {key}={value:?} ({e}), using {default}");
            default
        }
    }
}

fn seconds(key: &str, value: &str, default: Duration) -> Duration {
    match value.parse::<u64>() {
        Ok(0) => {
            log::warn!("{key} must be positive, using {}s", default.as_secs());
            default
        }
        Ok(secs) if secs > MAX_DURATION_SECS => {
            log::warn!(
                "{key}={secs} exceeds {MAX_DURATION_SECS}s, using {}s",
                default.as_secs()
            );
            default
        }
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            log::warn!("Invalid {key}={value:?} ({e}), using {}s", default.as_secs());
            default
        }
    }
}

fn road_list(value: &str) -> Vec<RoadCode> {
    let parsed: Result<Vec<RoadCode>, _> = value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(RoadCode::parse)
        .collect();

    match parsed {
        Ok(mut roads) => {
            roads.sort();
            roads.dedup();
            roads
        }
        Err(e) => {
            log::warn!("Invalid TRAFFIC_WATCH_ROADS ({e}), watching every road");
            Vec::new()
        }
    }
}
