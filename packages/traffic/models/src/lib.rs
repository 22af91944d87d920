#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic disruption and speed camera domain types.
//!
//! This crate defines the canonical record shapes produced by the scrape
//! pipeline and served by the API. Every textual field that could not be
//! resolved from the source holds the [`UNKNOWN`] sentinel instead of raw
//! scraped text, and every categorical field is a closed enum.

pub mod road;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use road::{InvalidRoadCodeError, RoadCode};

/// Canonical stand-in for any field the normalizer could not resolve.
pub const UNKNOWN: &str = "unknown";

/// Returns `true` if `value` is the [`UNKNOWN`] sentinel.
#[must_use]
pub fn is_unknown(value: &str) -> bool {
    value == UNKNOWN
}

/// Canonical cause categories for a traffic disruption.
///
/// Variants are declared in classification priority order: when free text
/// matches keywords of several categories, the earliest variant wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CauseCategory {
    /// Collisions, breakdowns and other incidents on the carriageway
    Accident,
    /// Planned or emergency road works and maintenance
    Roadworks,
    /// Rain, snow, ice, fog and storm
    Weather,
    /// Plain traffic volume (rush hour, busy roads)
    CongestionVolume,
    /// Concerts, matches, demonstrations and other events
    Event,
    /// No recognised cause
    Unknown,
}

impl CauseCategory {
    /// Returns all variants in classification priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Accident,
            Self::Roadworks,
            Self::Weather,
            Self::CongestionVolume,
            Self::Event,
            Self::Unknown,
        ]
    }

    /// Returns `true` for [`CauseCategory::Unknown`].
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Kind of speed camera placement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CameraType {
    /// A mobile speed check (police van, handheld laser)
    Mobile,
    /// A fixed camera post reported as switched on
    FixedActive,
    /// Average-speed section control or dynamic speed check
    DynamicSpeedCheck,
}

/// How an extraction strategy finds its candidates.
///
/// Structural strategies read the page's markup or embedded data and are
/// preferred over text strategies when two candidates tie during
/// deduplication.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    /// DOM selectors or structured feed data
    Structural,
    /// Regular expressions over flattened page text
    Text,
}

/// Where a normalized entity came from, kept for tie-breaking and
/// diagnostics only. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Name of the extraction strategy that produced the candidate.
    pub strategy: &'static str,
    /// Kind of the extraction strategy.
    pub kind: StrategyKind,
    /// Discovery position across the whole cycle (registry order, then
    /// document order).
    pub ordinal: usize,
}

/// Counts the fields of a record that hold the [`UNKNOWN`] sentinel.
pub trait Unresolved {
    /// Returns the number of unresolved fields.
    fn unresolved_fields(&self) -> usize;
}

/// A record keyed by its content fingerprint.
pub trait Identified {
    /// Returns the fingerprint id.
    fn id(&self) -> &str;
}

/// A normalized entity together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    /// The canonical record.
    pub entity: T,
    /// The candidate's provenance.
    pub provenance: Provenance,
}

/// A reported traffic jam or delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficDisruption {
    /// Content fingerprint (road, direction, location anchor, cause).
    pub id: String,
    /// Canonical road code.
    pub road: RoadCode,
    /// Directional descriptor, e.g. `"richting Utrecht"`.
    pub direction: String,
    /// Reported delay in minutes (`0` when none was given).
    pub delay_minutes: u32,
    /// Jam length in kilometres (`0.0` when none was given).
    pub length_km: f64,
    /// Canonical name of the place the jam starts from.
    pub source_location: String,
    /// Canonical name of the place the jam runs towards.
    pub destination_location: String,
    /// Junction or exit reference, e.g. `"knooppunt Deil"`.
    pub route_details: String,
    /// Canonical cause category.
    pub cause: CauseCategory,
    /// Start time of the cycle that produced this record.
    pub last_updated: DateTime<Utc>,
}

impl Identified for TrafficDisruption {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Unresolved for TrafficDisruption {
    fn unresolved_fields(&self) -> usize {
        [
            self.direction.as_str(),
            self.source_location.as_str(),
            self.destination_location.as_str(),
            self.route_details.as_str(),
        ]
        .iter()
        .filter(|v| is_unknown(v))
        .count()
            + usize::from(self.cause.is_unknown())
    }
}

/// A reported speed camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedCameraSighting {
    /// Content fingerprint (road, location anchor, camera type).
    pub id: String,
    /// Canonical road code.
    pub road: RoadCode,
    /// Canonical place or junction near the camera.
    pub location: String,
    /// Directional descriptor.
    pub direction: String,
    /// Hectometre marker, when the source gives one.
    pub hectometer: Option<f64>,
    /// Kind of camera placement.
    pub camera_type: CameraType,
    /// Whether the source explicitly marks the camera as currently active.
    pub is_active: bool,
    /// Start time of the cycle that produced this record.
    pub last_updated: DateTime<Utc>,
}

impl Identified for SpeedCameraSighting {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Unresolved for SpeedCameraSighting {
    fn unresolved_fields(&self) -> usize {
        usize::from(is_unknown(&self.location)) + usize::from(is_unknown(&self.direction))
    }
}

/// The current published record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Deduplicated disruptions from the last successful cycle.
    pub traffic_jams: Vec<TrafficDisruption>,
    /// Deduplicated camera sightings from the last successful cycle.
    pub speed_cameras: Vec<SpeedCameraSighting>,
    /// When the last successful cycle started. `None` until the first one.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Returns `true` if the snapshot was never populated by a cycle.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.last_updated.is_none()
    }
}

/// Outcome of one scrape cycle. Only the latest one is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeCycleResult {
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the cycle published a new snapshot.
    pub success: bool,
    /// Deduplicated disruptions, empty on failure.
    pub jams: Vec<TrafficDisruption>,
    /// Deduplicated camera sightings, empty on failure.
    pub cameras: Vec<SpeedCameraSighting>,
    /// Failure description when `success` is `false`.
    pub error: Option<String>,
}
