//! Embedded JSON strategy.
//!
//! Handles a JSON feed body as well as JSON embedded in HTML
//! (`<script type="application/json">`, `ld+json` and Next.js
//! `__NEXT_DATA__` blocks). Documents are walked recursively; any object
//! with a road key, or inheriting one from an ancestor, that also carries
//! disruption or camera fields becomes a candidate.

use scraper::Html;
use serde_json::{Map, Value};
use traffic_monitor_traffic_models::StrategyKind;

use crate::text::parse_selector;
use crate::{ExtractError, ExtractionStrategy, RawCamera, RawJam, RawSource, StrategyOutput};

use super::{CAMERA_KEYWORDS, mentions_camera};

const ROAD_KEYS: &[&str] = &["road", "roadNumber", "road_number", "roadName", "wegnummer", "weg"];
const DIRECTION_KEYS: &[&str] = &["direction", "richting", "towards"];
const LOCATION_KEYS: &[&str] = &["location", "locatie", "segment", "label", "title"];
const FROM_KEYS: &[&str] = &["from", "van", "start"];
const TO_KEYS: &[&str] = &["to", "naar", "end"];
const DELAY_KEYS: &[&str] = &["delay", "delayMinutes", "delay_minutes", "vertraging"];
const LENGTH_KEYS: &[&str] = &["length", "lengthKm", "length_km", "distance", "lengte"];
const CAUSE_KEYS: &[&str] = &["cause", "reason", "oorzaak", "description", "omschrijving"];
const CATEGORY_KEYS: &[&str] = &["type", "category", "kind", "categorie"];
const HECTOMETER_KEYS: &[&str] = &["hectometer", "hm", "hmp"];
const CAMERA_TYPE_KEYS: &[&str] = &["cameraType", "camera_type"];
const ACTIVE_KEYS: &[&str] = &["active", "isActive", "is_active", "actief"];

/// Structural strategy over JSON feeds and embedded JSON blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedJsonStrategy;

impl ExtractionStrategy for EmbeddedJsonStrategy {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn extract(&self, source: &RawSource) -> Result<StrategyOutput, ExtractError> {
        let body = source.require_body()?;
        let mut output = StrategyOutput::default();

        if source.is_json() {
            let value: Value = serde_json::from_str(body)?;
            walk(&value, None, &mut output);
            return Ok(output);
        }

        let scripts = parse_selector(
            r#"script[type="application/json"], script[type="application/ld+json"], script#__NEXT_DATA__"#,
        )?;
        let document = Html::parse_document(body);

        for script in document.select(&scripts) {
            let content = script.text().collect::<String>();
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(content) {
                Ok(value) => walk(&value, None, &mut output),
                Err(e) => log::debug!("Skipping unparseable embedded JSON block: {e}"),
            }
        }

        Ok(output)
    }
}

fn walk(value: &Value, inherited_road: Option<&str>, output: &mut StrategyOutput) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, inherited_road, output);
            }
        }
        Value::Object(map) => {
            let own_road = field(map, ROAD_KEYS);
            let road = own_road.as_deref().or(inherited_road);

            if let Some(road) = road {
                if is_camera(map) {
                    output.cameras.push(camera(map, road));
                } else if is_jam(map) {
                    output.jams.push(jam(map, road));
                }
            }

            for child in map.values() {
                if child.is_object() || child.is_array() {
                    walk(child, road, output);
                }
            }
        }
        _ => {}
    }
}

fn is_jam(map: &Map<String, Value>) -> bool {
    [DELAY_KEYS, LENGTH_KEYS, CAUSE_KEYS, DIRECTION_KEYS]
        .iter()
        .any(|keys| field(map, keys).is_some())
}

fn is_camera(map: &Map<String, Value>) -> bool {
    if field(map, CAMERA_TYPE_KEYS).is_some() {
        return true;
    }
    CATEGORY_KEYS.iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|v| CAMERA_KEYWORDS.iter().any(|k| v.to_lowercase().contains(k)))
    })
}

fn jam(map: &Map<String, Value>, road: &str) -> RawJam {
    let location = field(map, LOCATION_KEYS).or_else(|| {
        match (field(map, FROM_KEYS), field(map, TO_KEYS)) {
            (Some(from), Some(to)) => Some(format!("{from} - {to}")),
            (Some(from), None) => Some(from),
            (None, Some(to)) => Some(format!("naar {to}")),
            (None, None) => None,
        }
    });
    let cause = field(map, CAUSE_KEYS).or_else(|| {
        field(map, CATEGORY_KEYS).filter(|c| !mentions_camera(c))
    });

    RawJam {
        road: Some(road.to_owned()),
        direction: field(map, DIRECTION_KEYS),
        location,
        route: None,
        delay: numeric_field(map, DELAY_KEYS, "min"),
        length: numeric_field(map, LENGTH_KEYS, "km"),
        cause,
        raw_text: scalar_text(map),
    }
}

fn camera(map: &Map<String, Value>, road: &str) -> RawCamera {
    RawCamera {
        road: Some(road.to_owned()),
        location: field(map, LOCATION_KEYS).or_else(|| field(map, FROM_KEYS)),
        direction: field(map, DIRECTION_KEYS),
        hectometer: field(map, HECTOMETER_KEYS),
        camera_type: field(map, CAMERA_TYPE_KEYS).or_else(|| field(map, CATEGORY_KEYS)),
        active: field(map, ACTIVE_KEYS),
        raw_text: scalar_text(map),
    }
}

/// Returns the first present key as text. Strings, numbers and booleans
/// are accepted; empty strings are treated as absent.
fn field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Like [`field`], but a bare number gets `unit` appended so the
/// normalizer sees the same shape as scraped text.
fn numeric_field(map: &Map<String, Value>, keys: &[&str], unit: &str) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::Number(n) => Some(format!("{n} {unit}")),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    })
}

/// Space-joined scalar values of an object, in key order.
fn scalar_text(map: &Map<String, Value>) -> String {
    map.values()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: RawSource) -> StrategyOutput {
        EmbeddedJsonStrategy.extract(&source).unwrap()
    }

    #[test]
    fn walks_json_feed_with_inherited_road() {
        let body = r#"{"roads": [
            {"road": "A2", "segments": [
                {"from": "Eindhoven", "to": "Weert", "delay": 12, "length": 3.5, "reason": "werkzaamheden"}
            ]},
            {"roadNumber": "A67", "speedcams": [
                {"type": "Flitser", "location": "Geldrop", "hm": 12.3, "active": true}
            ]}
        ]}"#;
        let output = run(RawSource::new("feed", body.to_string()));

        assert_eq!(output.jams.len(), 1);
        let jam = &output.jams[0];
        assert_eq!(jam.road.as_deref(), Some("A2"));
        assert_eq!(jam.location.as_deref(), Some("Eindhoven - Weert"));
        assert_eq!(jam.delay.as_deref(), Some("12 min"));
        assert_eq!(jam.length.as_deref(), Some("3.5 km"));
        assert_eq!(jam.cause.as_deref(), Some("werkzaamheden"));

        assert_eq!(output.cameras.len(), 1);
        let camera = &output.cameras[0];
        assert_eq!(camera.road.as_deref(), Some("A67"));
        assert_eq!(camera.hectometer.as_deref(), Some("12.3"));
        assert_eq!(camera.camera_type.as_deref(), Some("Flitser"));
        assert_eq!(camera.active.as_deref(), Some("true"));
    }

    #[test]
    fn reads_script_blocks_and_skips_broken_ones() {
        let body = r#"<html><body>
            <script type="application/json">{not json</script>
            <script id="__NEXT_DATA__" type="application/json">
              {"props": {"jams": [{"road": "A50", "direction": "richting Nijmegen", "delay": "+ 9 min"}]}}
            </script></body></html>"#;
        let output = run(RawSource::new("page", body.to_string()));

        assert_eq!(output.jams.len(), 1);
        assert_eq!(output.jams[0].direction.as_deref(), Some("richting Nijmegen"));
        assert_eq!(output.jams[0].delay.as_deref(), Some("+ 9 min"));
    }

    #[test]
    fn invalid_json_feed_is_error() {
        let source = RawSource::new("feed", "{\"roads\": [".to_string());
        assert!(matches!(
            EmbeddedJsonStrategy.extract(&source),
            Err(ExtractError::Json(_))
        ));
    }

    #[test]
    fn html_without_json_is_empty() {
        let output = run(RawSource::new("page", "<html><body>A2</body></html>".to_string()));
        assert!(output.jams.is_empty());
        assert!(output.cameras.is_empty());
    }
}
