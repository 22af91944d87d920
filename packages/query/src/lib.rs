#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only filtering of the current snapshot.
//!
//! Filters are validated up front by [`TrafficFilter::from_params`]; a
//! value that cannot be honoured is an error, never silently dropped.
//! Querying is a pure function of the snapshot and the filter.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use traffic_monitor_traffic_models::{
    RoadCode, Snapshot, SpeedCameraSighting, TrafficDisruption, is_unknown,
};

/// Errors for filter values that cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A road filter is not a road code.
    #[error("Invalid road '{value}': expected a road code such as A2 or N69")]
    InvalidRoad {
        /// The rejected input.
        value: String,
    },

    /// `min_delay` is not a non-negative whole number of minutes.
    #[error("Invalid min_delay '{value}': expected a whole number of minutes >= 0")]
    InvalidMinDelay {
        /// The rejected input.
        value: String,
    },
}

/// Raw filter parameters as they arrive in a query string.
///
/// `roads` and `cities` are comma-separated lists. Empty values are
/// treated as not supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafficQueryParams {
    /// Single road code.
    pub road: Option<String>,
    /// Comma-separated road codes.
    pub roads: Option<String>,
    /// Single city or place fragment.
    pub city: Option<String>,
    /// Comma-separated cities or place fragments.
    pub cities: Option<String>,
    /// Minimum delay in minutes, inclusive.
    pub min_delay: Option<String>,
}

/// Validated filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficFilter {
    /// Accepted roads. Empty means any road.
    pub roads: Vec<RoadCode>,
    /// Lowercased place fragments. Empty means any place.
    pub cities: Vec<String>,
    /// Inclusive lower bound on the jam delay.
    pub min_delay: Option<u32>,
}

impl TrafficFilter {
    /// Validates raw parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if a road is not a road code or
    /// `min_delay` is not a non-negative integer.
    pub fn from_params(params: &TrafficQueryParams) -> Result<Self, FilterError> {
        let mut roads = Vec::new();
        for value in list_values(params.road.as_deref(), params.roads.as_deref()) {
            let road = RoadCode::parse(value).map_err(|_| FilterError::InvalidRoad {
                value: value.to_string(),
            })?;
            if !roads.contains(&road) {
                roads.push(road);
            }
        }

        let mut cities = Vec::new();
        for value in list_values(params.city.as_deref(), params.cities.as_deref()) {
            let city = value.to_lowercase();
            if !cities.contains(&city) {
                cities.push(city);
            }
        }

        let min_delay = match params.min_delay.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(value.parse::<u32>().map_err(|_| {
                FilterError::InvalidMinDelay {
                    value: value.to_string(),
                }
            })?),
        };

        Ok(Self {
            roads,
            cities,
            min_delay,
        })
    }

    /// Returns `true` if the filter accepts everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty() && self.cities.is_empty() && self.min_delay.is_none()
    }

    /// Returns `true` if the disruption passes every supplied filter.
    #[must_use]
    pub fn matches_jam(&self, jam: &TrafficDisruption) -> bool {
        self.matches_road(&jam.road)
            && self.min_delay.is_none_or(|min| jam.delay_minutes >= min)
            && self.matches_places(&[
                jam.source_location.as_str(),
                jam.destination_location.as_str(),
                jam.route_details.as_str(),
                jam.direction.as_str(),
            ])
    }

    /// Returns `true` if the camera passes the road and city filters.
    #[must_use]
    pub fn matches_camera(&self, camera: &SpeedCameraSighting) -> bool {
        self.matches_road(&camera.road)
            && self.matches_places(&[camera.location.as_str(), camera.direction.as_str()])
    }

    fn matches_road(&self, road: &RoadCode) -> bool {
        self.roads.is_empty() || self.roads.contains(road)
    }

    fn matches_places(&self, fields: &[&str]) -> bool {
        self.cities.is_empty()
            || fields
                .iter()
                .filter(|f| !is_unknown(f))
                .map(|f| f.to_lowercase())
                .any(|f| self.cities.iter().any(|c| f.contains(c.as_str())))
    }
}

/// The filtered view of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficView {
    /// Number of jams in the snapshot before filtering.
    pub total_jams: usize,
    /// Number of jams after filtering.
    pub filtered_jams: usize,
    /// Matching jams, in snapshot order.
    pub traffic_jams: Vec<TrafficDisruption>,
    /// Matching cameras, in snapshot order.
    pub speed_cameras: Vec<SpeedCameraSighting>,
    /// When the snapshot was last refreshed.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Applies a filter to a snapshot.
#[must_use]
pub fn query(snapshot: &Snapshot, filter: &TrafficFilter) -> TrafficView {
    let traffic_jams: Vec<TrafficDisruption> = snapshot
        .traffic_jams
        .iter()
        .filter(|jam| filter.matches_jam(jam))
        .cloned()
        .collect();
    let speed_cameras = snapshot
        .speed_cameras
        .iter()
        .filter(|camera| filter.matches_camera(camera))
        .cloned()
        .collect();

    TrafficView {
        total_jams: snapshot.traffic_jams.len(),
        filtered_jams: traffic_jams.len(),
        traffic_jams,
        speed_cameras,
        last_updated: snapshot.last_updated,
    }
}

/// Distinct roads present in the snapshot, in natural order.
#[must_use]
pub fn known_roads(snapshot: &Snapshot) -> Vec<RoadCode> {
    snapshot
        .traffic_jams
        .iter()
        .map(|jam| &jam.road)
        .chain(snapshot.speed_cameras.iter().map(|camera| &camera.road))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Trimmed, non-empty values of a single parameter and its list form.
fn list_values<'a>(single: Option<&'a str>, list: Option<&'a str>) -> Vec<&'a str> {
    single
        .into_iter()
        .chain(list.into_iter().flat_map(|l| l.split(',')))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use traffic_monitor_traffic_models::{CameraType, CauseCategory, UNKNOWN};

    use super::*;

    fn jam(road: &str, delay: u32, source: &str, destination: &str) -> TrafficDisruption {
        TrafficDisruption {
            id: format!("{road}-{delay}"),
            road: RoadCode::parse(road).unwrap(),
            direction: format!("richting {destination}"),
            delay_minutes: delay,
            length_km: 1.0,
            source_location: source.to_string(),
            destination_location: destination.to_string(),
            route_details: UNKNOWN.to_string(),
            cause: CauseCategory::Unknown,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn camera(road: &str, location: &str) -> SpeedCameraSighting {
        SpeedCameraSighting {
            id: format!("{road}-{location}"),
            road: RoadCode::parse(road).unwrap(),
            location: location.to_string(),
            direction: UNKNOWN.to_string(),
            hectometer: None,
            camera_type: CameraType::Mobile,
            is_active: false,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            traffic_jams: vec![
                jam("A2", 0, "Eindhoven", "Weert"),
                jam("A2", 12, UNKNOWN, "Utrecht"),
                jam("A67", 30, "Eindhoven", "Venlo"),
                jam("N69", 5, "Valkenswaard", "Belgische Grens"),
            ],
            speed_cameras: vec![camera("A67", "Geldrop"), camera("N69", "Valkenswaard")],
            last_updated: Some(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    fn filter(params: TrafficQueryParams) -> TrafficFilter {
        TrafficFilter::from_params(&params).unwrap()
    }

    #[test]
    fn no_filters_return_the_whole_snapshot() {
        let f = filter(TrafficQueryParams::default());
        assert!(f.is_empty());

        let view = query(&snapshot(), &f);
        assert_eq!(view.total_jams, 4);
        assert_eq!(view.filtered_jams, 4);
        assert_eq!(view.speed_cameras.len(), 2);
        assert_eq!(view.last_updated, Some(DateTime::<Utc>::UNIX_EPOCH));
    }

    #[test]
    fn empty_values_mean_not_supplied() {
        let f = filter(TrafficQueryParams {
            road: Some(String::new()),
            cities: Some(" , ".to_string()),
            min_delay: Some(String::new()),
            ..TrafficQueryParams::default()
        });
        assert!(f.is_empty());
    }

    #[test]
    fn road_filter_is_normalized_and_exact() {
        let f = filter(TrafficQueryParams {
            road: Some(" a2 ".to_string()),
            ..TrafficQueryParams::default()
        });
        let view = query(&snapshot(), &f);
        assert_eq!(view.filtered_jams, 2);
        assert!(view.traffic_jams.iter().all(|j| j.road.as_str() == "A2"));
        assert!(view.speed_cameras.is_empty());
        assert_eq!(view.total_jams, 4);
    }

    #[test]
    fn road_lists_are_unioned() {
        let f = filter(TrafficQueryParams {
            road: Some("N69".to_string()),
            roads: Some("A67, n69".to_string()),
            ..TrafficQueryParams::default()
        });
        assert_eq!(f.roads.len(), 2);
        let view = query(&snapshot(), &f);
        assert_eq!(view.filtered_jams, 2);
        assert_eq!(view.speed_cameras.len(), 2);
    }

    #[test]
    fn min_delay_is_an_inclusive_lower_bound() {
        let f = filter(TrafficQueryParams {
            min_delay: Some("12".to_string()),
            ..TrafficQueryParams::default()
        });
        let view = query(&snapshot(), &f);
        let delays: Vec<u32> = view.traffic_jams.iter().map(|j| j.delay_minutes).collect();
        assert_eq!(delays, vec![12, 30]);
        assert_eq!(view.speed_cameras.len(), 2);
    }

    #[test]
    fn city_matches_places_case_insensitively() {
        let f = filter(TrafficQueryParams {
            city: Some("eindHOVEN".to_string()),
            ..TrafficQueryParams::default()
        });
        let view = query(&snapshot(), &f);
        assert_eq!(view.filtered_jams, 2);
        assert!(view.speed_cameras.is_empty());

        let f = filter(TrafficQueryParams {
            cities: Some("utrecht,valkens".to_string()),
            ..TrafficQueryParams::default()
        });
        let view = query(&snapshot(), &f);
        assert_eq!(view.filtered_jams, 2);
        assert_eq!(view.speed_cameras.len(), 1);
    }

    #[test]
    fn city_never_matches_the_sentinel() {
        let f = filter(TrafficQueryParams {
            city: Some("unkn".to_string()),
            ..TrafficQueryParams::default()
        });
        let view = query(&snapshot(), &f);
        assert_eq!(view.filtered_jams, 0);
        assert!(view.speed_cameras.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = TrafficFilter::from_params(&TrafficQueryParams {
            min_delay: Some("abc".to_string()),
            ..TrafficQueryParams::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidMinDelay {
                value: "abc".to_string()
            }
        );

        assert!(TrafficFilter::from_params(&TrafficQueryParams {
            min_delay: Some("-5".to_string()),
            ..TrafficQueryParams::default()
        })
        .is_err());

        assert!(matches!(
            TrafficFilter::from_params(&TrafficQueryParams {
                roads: Some("A2,Utrecht".to_string()),
                ..TrafficQueryParams::default()
            }),
            Err(FilterError::InvalidRoad { value }) if value == "Utrecht"
        ));
    }

    #[test]
    fn lists_known_roads_in_natural_order() {
        let roads: Vec<String> = known_roads(&snapshot())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(roads, vec!["A2", "A67", "N69"]);
    }
}
