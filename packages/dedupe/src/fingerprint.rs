//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 of the identifying fields of a record,
//! truncated to 16 bytes and hex-encoded. Two records that describe the
//! same disruption or camera produce the same fingerprint regardless of
//! which strategy found them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{AsRefStr, Display, EnumString};
use traffic_monitor_traffic_models::{CameraType, CauseCategory};

/// Number of digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Separator between hashed fields. Cannot occur in scraped text.
const FIELD_SEPARATOR: u8 = 0x1f;

/// How much location detail goes into a fingerprint.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AnchorPrecision {
    /// Jams anchor on their source city, cameras on their location.
    #[default]
    Coarse,
    /// Jams also anchor on route details, cameras also on the hectometre
    /// marker rounded to whole kilometres.
    Fine,
}

/// Identifying fields of a traffic disruption.
#[derive(Debug, Clone, Copy)]
pub struct JamKey<'a> {
    /// Canonical road code.
    pub road: &'a str,
    /// Direction signature (see the normalizer).
    pub direction: &'a str,
    /// Canonical source location.
    pub source_location: &'a str,
    /// Canonical route details.
    pub route_details: &'a str,
    /// Cause category.
    pub cause: CauseCategory,
}

/// Identifying fields of a speed camera sighting.
#[derive(Debug, Clone, Copy)]
pub struct CameraKey<'a> {
    /// Canonical road code.
    pub road: &'a str,
    /// Canonical location.
    pub location: &'a str,
    /// Hectometre marker.
    pub hectometer: Option<f64>,
    /// Camera type.
    pub camera_type: CameraType,
}

/// Computes fingerprints at a fixed [`AnchorPrecision`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    precision: AnchorPrecision,
}

impl Fingerprinter {
    /// Creates a fingerprinter.
    #[must_use]
    pub const fn new(precision: AnchorPrecision) -> Self {
        Self { precision }
    }

    /// Returns the configured precision.
    #[must_use]
    pub const fn precision(&self) -> AnchorPrecision {
        self.precision
    }

    /// Fingerprint of a traffic disruption.
    #[must_use]
    pub fn jam(&self, key: &JamKey<'_>) -> String {
        let mut fields = vec![
            "jam".to_owned(),
            key.road.to_owned(),
            key.direction.to_lowercase(),
            key.source_location.to_lowercase(),
            key.cause.to_string(),
        ];
        if self.precision == AnchorPrecision::Fine {
            fields.push(key.route_details.to_lowercase());
        }
        digest(&fields)
    }

    /// Fingerprint of a speed camera sighting.
    #[must_use]
    pub fn camera(&self, key: &CameraKey<'_>) -> String {
        let mut fields = vec![
            "camera".to_owned(),
            key.road.to_owned(),
            key.location.to_lowercase(),
            key.camera_type.to_string(),
        ];
        if self.precision == AnchorPrecision::Fine {
            fields.push(
                key.hectometer
                    .map_or_else(String::new, |hm| format!("{:.0}", hm.round())),
            );
        }
        digest(&fields)
    }
}

fn digest(fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(field.trim().as_bytes());
    }
    let hash = hasher.finalize();
    hex::encode(&hash[..FINGERPRINT_BYTES])
}
