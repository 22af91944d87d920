#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalization of raw traffic candidates into canonical records.
//!
//! The [`Normalizer`] is a pure function of the candidate, the
//! [`Vocabulary`] and the cycle time. It resolves the road code (or
//! discards the candidate), parses quantities, classifies causes and
//! camera types, resolves places against the vocabulary and replaces
//! anything it cannot resolve with the `"unknown"` sentinel. It also
//! stamps each record with its content fingerprint.

pub mod cause;
pub mod markup;
pub mod quantity;
pub mod vocabulary;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use traffic_monitor_dedupe::{CameraKey, Fingerprinter, JamKey};
use traffic_monitor_scraper::{CameraCandidate, Extraction, JamCandidate};
use traffic_monitor_traffic_models::{
    CameraType, CauseCategory, Normalized, RoadCode, SpeedCameraSighting, StrategyKind,
    TrafficDisruption, UNKNOWN, is_unknown,
};

pub use vocabulary::{Vocabulary, VocabularyError, netherlands};

static ROAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]\d{1,3}\b").expect("valid regex"));

static ARROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[→←↑↓⇒➔»]\s*").expect("valid regex"));

static FROM_TO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:\bvan)\s+(.+?)\s+(?i:naar)\s+(.+)").expect("valid regex"));

static BETWEEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:\btussen)\s+(.+?)\s+(?i:en)\s+(.+)").expect("valid regex"));

/// Preposition used when a direction is derived from a route header.
const DERIVED_DIRECTION_PREPOSITION: &str = "richting";

/// Longest text accepted as a free-standing place name.
const MAX_PLACE_CHARS: usize = 40;

/// Why a candidate was dropped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiscardReason {
    /// No road code could be found in the candidate.
    MissingRoad,
    /// A camera found in page text names neither a place nor a hectometre
    /// marker, so nothing ties it to a real camera.
    UnanchoredCamera,
}

/// Normalized records of one extraction plus discard counts.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Normalized disruptions, in candidate order.
    pub jams: Vec<Normalized<TrafficDisruption>>,
    /// Normalized camera sightings, in candidate order.
    pub cameras: Vec<Normalized<SpeedCameraSighting>>,
    /// Number of discarded candidates per reason.
    pub discarded: BTreeMap<DiscardReason, usize>,
}

impl NormalizedBatch {
    /// Total number of discarded candidates.
    #[must_use]
    pub fn discarded_total(&self) -> usize {
        self.discarded.values().sum()
    }
}

/// Converts raw candidates into canonical records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    vocabulary: Arc<Vocabulary>,
    fingerprinter: Fingerprinter,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(netherlands(), Fingerprinter::default())
    }
}

impl Normalizer {
    /// Creates a normalizer over a vocabulary and fingerprint precision.
    #[must_use]
    pub const fn new(vocabulary: Arc<Vocabulary>, fingerprinter: Fingerprinter) -> Self {
        Self {
            vocabulary,
            fingerprinter,
        }
    }

    /// Returns the vocabulary in use.
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Normalizes every candidate of an extraction.
    #[must_use]
    pub fn normalize_all(&self, extraction: &Extraction, cycle_time: DateTime<Utc>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for candidate in &extraction.jams {
            match self.normalize_jam(candidate, cycle_time) {
                Ok(jam) => batch.jams.push(jam),
                Err(reason) => {
                    log::debug!(
                        "Discarding jam candidate from {} ({reason}): {:?}",
                        candidate.strategy,
                        candidate.fields.raw_text
                    );
                    *batch.discarded.entry(reason).or_default() += 1;
                }
            }
        }

        for candidate in &extraction.cameras {
            match self.normalize_camera(candidate, cycle_time) {
                Ok(camera) => batch.cameras.push(camera),
                Err(reason) => {
                    log::debug!(
                        "Discarding camera candidate from {} ({reason}): {:?}",
                        candidate.strategy,
                        candidate.fields.raw_text
                    );
                    *batch.discarded.entry(reason).or_default() += 1;
                }
            }
        }

        log::info!(
            "Normalized {} jams and {} cameras ({} candidates discarded)",
            batch.jams.len(),
            batch.cameras.len(),
            batch.discarded_total()
        );

        batch
    }

    /// Normalizes one jam candidate.
    ///
    /// # Errors
    ///
    /// Returns [`DiscardReason::MissingRoad`] if no road code can be found.
    pub fn normalize_jam(
        &self,
        candidate: &JamCandidate,
        cycle_time: DateTime<Utc>,
    ) -> Result<Normalized<TrafficDisruption>, DiscardReason> {
        let fields = &candidate.fields;
        let raw_text = markup::strip_markup(&fields.raw_text);
        let road = resolve_road(fields.road.as_deref(), &raw_text)?;

        let location = markup::clean(fields.location.as_deref()).map(|l| replace_arrows(&l));
        let route = markup::clean(fields.route.as_deref()).map(|r| replace_arrows(&r));
        let explicit_direction = markup::clean(fields.direction.as_deref());

        let (mut source, mut destination) = [location.as_deref(), route.as_deref()]
            .into_iter()
            .flatten()
            .map(|l| self.endpoints(l))
            .find(|(s, d)| s.is_some() || d.is_some())
            .unwrap_or_else(|| self.endpoints(&replace_arrows(&raw_text)));

        let direction = explicit_direction
            .as_deref()
            .and_then(|d| self.explicit_direction(d))
            .or_else(|| self.vocabulary.direction(&raw_text))
            .or_else(|| location.as_deref().and_then(|l| self.vocabulary.direction(l)))
            .or_else(|| route.as_deref().and_then(|r| self.vocabulary.direction(r)))
            .or_else(|| {
                destination
                    .as_ref()
                    .map(|d| format!("{DERIVED_DIRECTION_PREPOSITION} {d}"))
            });

        if destination.is_none() {
            destination = direction.as_deref().and_then(|d| self.endpoint(d));
        }
        if source.is_some() && source == destination {
            source = None;
        }

        let route_details = [location.as_deref(), route.as_deref(), Some(raw_text.as_str())]
            .into_iter()
            .flatten()
            .find_map(|text| self.vocabulary.junction(text));

        let mut cause = markup::clean(fields.cause.as_deref())
            .map_or(CauseCategory::Unknown, |c| cause::classify_cause(&c));
        if cause.is_unknown() {
            cause = cause::classify_cause(&raw_text);
        }

        let delay_minutes = markup::clean(fields.delay.as_deref())
            .and_then(|d| quantity::parse_delay_minutes(&d))
            .or_else(|| quantity::parse_delay_minutes(&raw_text))
            .unwrap_or(0);
        let length_km = markup::clean(fields.length.as_deref())
            .and_then(|l| quantity::parse_length_km(&l))
            .or_else(|| quantity::parse_length_km(&raw_text))
            .unwrap_or(0.0);

        let direction = or_unknown(direction);
        let source_location = or_unknown(source);
        let destination_location = or_unknown(destination);
        let route_details = or_unknown(route_details);

        let id = self.fingerprinter.jam(&JamKey {
            road: road.as_str(),
            direction: &self.direction_signature(&direction),
            source_location: &source_location,
            route_details: &route_details,
            cause,
        });

        Ok(Normalized {
            entity: TrafficDisruption {
                id,
                road,
                direction,
                delay_minutes,
                length_km,
                source_location,
                destination_location,
                route_details,
                cause,
                last_updated: cycle_time,
            },
            provenance: candidate.provenance(),
        })
    }

    /// Normalizes one camera candidate. A candidate naming no camera type
    /// is a mobile check.
    ///
    /// # Errors
    ///
    /// Returns [`DiscardReason::MissingRoad`] if no road code can be found,
    /// and [`DiscardReason::UnanchoredCamera`] for a text candidate that
    /// resolves neither a location nor a hectometre marker.
    pub fn normalize_camera(
        &self,
        candidate: &CameraCandidate,
        cycle_time: DateTime<Utc>,
    ) -> Result<Normalized<SpeedCameraSighting>, DiscardReason> {
        let fields = &candidate.fields;
        let raw_text = markup::strip_markup(&fields.raw_text);
        let road = resolve_road(fields.road.as_deref(), &raw_text)?;

        let location = markup::clean(fields.location.as_deref())
            .and_then(|l| self.place(&replace_arrows(&l)))
            .or_else(|| self.vocabulary.junction(&raw_text))
            .or_else(|| self.vocabulary.location(&raw_text))
            .or_else(|| self.vocabulary.find_city(&raw_text).map(str::to_owned));

        let direction = markup::clean(fields.direction.as_deref())
            .and_then(|d| self.explicit_direction(&d))
            .or_else(|| self.vocabulary.direction(&raw_text));

        let hectometer = markup::clean(fields.hectometer.as_deref())
            .and_then(|h| quantity::parse_hectometer(&h))
            .or_else(|| quantity::parse_hectometer(&raw_text));

        if candidate.kind == StrategyKind::Text && location.is_none() && hectometer.is_none() {
            return Err(DiscardReason::UnanchoredCamera);
        }

        let camera_type = markup::clean(fields.camera_type.as_deref())
            .and_then(|t| cause::classify_camera(&t))
            .or_else(|| cause::classify_camera(&raw_text))
            .unwrap_or(CameraType::Mobile);

        let is_active = cause::is_active(fields.active.as_deref(), &raw_text);

        let location = or_unknown(location);
        let direction = or_unknown(direction);

        let id = self.fingerprinter.camera(&CameraKey {
            road: road.as_str(),
            location: &location,
            hectometer,
            camera_type,
        });

        Ok(Normalized {
            entity: SpeedCameraSighting {
                id,
                road,
                location,
                direction,
                hectometer,
                camera_type,
                is_active,
                last_updated: cycle_time,
            },
            provenance: candidate.provenance(),
        })
    }

    /// Reduces a direction descriptor to the part that identifies it: the
    /// known city it names, else the text without prepositions, lowercased.
    #[must_use]
    pub fn direction_signature(&self, direction: &str) -> String {
        if is_unknown(direction) {
            return UNKNOWN.to_owned();
        }
        self.vocabulary.find_city(direction).map_or_else(
            || self.vocabulary.strip_prepositions(direction).to_lowercase(),
            str::to_lowercase,
        )
    }

    /// A direction field as given by a structural source: either a
    /// preposition phrase or a bare place name.
    fn explicit_direction(&self, text: &str) -> Option<String> {
        self.vocabulary
            .direction(text)
            .or_else(|| looks_like_place(text).then(|| text.to_owned()))
    }

    /// Splits a route description into source and destination places.
    fn endpoints(&self, text: &str) -> (Option<String>, Option<String>) {
        let captures = FROM_TO_RE
            .captures(text)
            .or_else(|| BETWEEN_RE.captures(text));
        if let Some(caps) = captures {
            return (
                self.endpoint(leading_part(&caps[1])),
                self.endpoint(leading_part(&caps[2])),
            );
        }

        if let Some((left, right)) = text.split_once(" - ") {
            return (
                self.endpoint(trailing_part(left).trim()),
                self.endpoint(leading_part(right)),
            );
        }

        (None, None)
    }

    /// Resolves one side of a route.
    fn endpoint(&self, side: &str) -> Option<String> {
        let side = self.vocabulary.strip_prepositions(side);
        if side.is_empty() {
            return None;
        }
        self.vocabulary
            .exact_city(side)
            .or_else(|| self.vocabulary.find_city(side))
            .map(str::to_owned)
            .or_else(|| looks_like_place(side).then(|| side.to_owned()))
    }

    /// Resolves a free-standing location descriptor.
    fn place(&self, text: &str) -> Option<String> {
        let text = self.vocabulary.strip_prepositions(text);
        self.vocabulary
            .exact_city(text)
            .map(str::to_owned)
            .or_else(|| self.vocabulary.junction(text))
            .or_else(|| looks_like_place(text).then(|| text.to_owned()))
            .or_else(|| self.vocabulary.find_city(text).map(str::to_owned))
    }
}

/// Finds the road code in the road field, falling back to the raw text.
fn resolve_road(field: Option<&str>, raw_text: &str) -> Result<RoadCode, DiscardReason> {
    field
        .and_then(find_road)
        .or_else(|| find_road(raw_text))
        .ok_or(DiscardReason::MissingRoad)
}

fn find_road(text: &str) -> Option<RoadCode> {
    let upper = text.to_uppercase();
    ROAD_RE
        .find(&upper)
        .and_then(|m| RoadCode::parse(m.as_str()).ok())
}

fn replace_arrows(text: &str) -> String {
    ARROW_RE.replace_all(text, " - ").into_owned()
}

/// The part of a route side before any punctuation, quantity or digit.
fn leading_part(side: &str) -> &str {
    let end = side
        .find(|c: char| matches!(c, ',' | ';' | ':' | '|' | '+' | '(') || c.is_ascii_digit())
        .unwrap_or(side.len());
    side[..end].trim()
}

/// The part of a route side after the last punctuation mark, with road
/// codes removed from its start.
fn trailing_part(side: &str) -> &str {
    let start = side
        .rfind([',', ';', ':', '|'])
        .map_or(0, |i| i + 1);
    let mut rest = side[start..].trim();
    while let Some(m) = ROAD_RE.find(rest) {
        if m.start() != 0 {
            break;
        }
        rest = rest[m.end()..].trim_start();
    }
    rest
}

/// A short run of capitalised words made of letters, apostrophes, hyphens
/// and dots.
fn looks_like_place(text: &str) -> bool {
    let text = text.trim();
    let starts_capitalised = text.starts_with("'s")
        || text.chars().next().is_some_and(char::is_uppercase);

    starts_capitalised
        && text.chars().count() <= MAX_PLACE_CHARS
        && text.split_whitespace().count() <= 4
        && text
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, ' ' | '\'' | '-' | '.'))
        && !is_unknown(text)
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty() && !markup::contains_markup(v))
        .unwrap_or_else(|| UNKNOWN.to_owned())
}
