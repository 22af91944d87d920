#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the traffic monitor server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain and query types to allow independent evolution of the
//! API contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use traffic_monitor_orchestrator::{CycleReport, Phase, TriggerOutcome};
use traffic_monitor_query::TrafficView;
use traffic_monitor_traffic_models::{SpeedCameraSighting, TrafficDisruption};

/// Response of `GET /api/traffic`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiTrafficResponse {
    /// Jams in the snapshot before filtering.
    pub total_jams: usize,
    /// Jams after filtering.
    pub filtered_jams: usize,
    /// Matching jams.
    pub traffic_jams: Vec<TrafficDisruption>,
    /// Matching cameras.
    pub speed_cameras: Vec<SpeedCameraSighting>,
    /// When the snapshot was last refreshed; `null` before the first
    /// successful cycle.
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<TrafficView> for ApiTrafficResponse {
    fn from(view: TrafficView) -> Self {
        Self {
            total_jams: view.total_jams,
            filtered_jams: view.filtered_jams,
            traffic_jams: view.traffic_jams,
            speed_cameras: view.speed_cameras,
            last_updated: view.last_updated,
        }
    }
}

/// Response of the refresh endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRefreshResponse {
    /// `started`, `already_running` or `unavailable`.
    pub status: TriggerOutcome,
    /// Human-readable summary.
    pub message: String,
}

impl From<TriggerOutcome> for ApiRefreshResponse {
    fn from(status: TriggerOutcome) -> Self {
        let message = match status {
            TriggerOutcome::Started => "Refresh started",
            TriggerOutcome::AlreadyRunning => "A refresh is already running",
            TriggerOutcome::Unavailable => "The refresh scheduler is not running",
        };
        Self {
            status,
            message: message.to_string(),
        }
    }
}

/// Counts of the current snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSnapshotSummary {
    /// Number of jams.
    pub jams: usize,
    /// Number of cameras.
    pub cameras: usize,
    /// When the snapshot was last refreshed.
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of snapshots published since start.
    pub version: u64,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiStatus {
    /// Where traffic data is fetched from.
    pub source: String,
    /// Orchestrator state.
    pub phase: Phase,
    /// The last finished cycle, if any.
    pub last_cycle: Option<CycleReport>,
    /// The current snapshot.
    pub snapshot: ApiSnapshotSummary,
    /// Watched roads; empty means every road.
    pub watch_roads: Vec<String>,
    /// Cities known to the place vocabulary.
    pub cities: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
