//! Cause and camera type classification.
//!
//! Maps free text from any strategy to the closed [`CauseCategory`] and
//! [`CameraType`] sets using keyword detection, case-insensitively. Checks
//! run in a fixed priority order and the first match wins, so overlapping
//! text ("ongeval bij werkzaamheden") always classifies the same way.

use std::str::FromStr;

use traffic_monitor_traffic_models::{CameraType, CauseCategory};

/// Classifies the cause of a disruption. Returns
/// [`CauseCategory::Unknown`] when nothing matches.
#[must_use]
pub fn classify_cause(raw: &str) -> CauseCategory {
    let lower = raw.trim().to_lowercase();

    if let Ok(category) = CauseCategory::from_str(&lower) {
        return category;
    }

    // ── Incidents (check before roadworks since some overlap) ────────
    if contains_any(
        &lower,
        &[
            "ongeval",
            "ongeluk",
            "aanrijding",
            "botsing",
            "incident",
            "pech",
            "gestrand",
            "voertuigbrand",
            "autobrand",
            "kantelde",
            "gekanteld",
            "accident",
            "crash",
            "collision",
            "breakdown",
        ],
    ) {
        return CauseCategory::Accident;
    }

    if contains_any(
        &lower,
        &[
            "werkzaamheden",
            "wegwerk",
            "onderhoud",
            "asfalt",
            "wegafsluiting wegens werk",
            "roadworks",
            "road works",
            "maintenance",
            "construction",
        ],
    ) {
        return CauseCategory::Roadworks;
    }

    if contains_any(
        &lower,
        &[
            "gladheid",
            "ijzel",
            "sneeuw",
            "hagel",
            "mist",
            "storm",
            "onweer",
            "regen",
            "wateroverlast",
            "weather",
            "snow",
            "fog",
        ],
    ) {
        return CauseCategory::Weather;
    }

    if contains_any(
        &lower,
        &[
            "drukte",
            "druk verkeer",
            "veel verkeer",
            "spits",
            "langzaam rijdend",
            "stilstaand",
            "congestion",
            "heavy traffic",
            "rush hour",
        ],
    ) {
        return CauseCategory::CongestionVolume;
    }

    if contains_any(
        &lower,
        &[
            "evenement",
            "concert",
            "festival",
            "wedstrijd",
            "voetbal",
            "demonstratie",
            "manifestatie",
            "optocht",
            "carnaval",
        ],
    ) {
        return CauseCategory::Event;
    }

    CauseCategory::Unknown
}

/// Classifies a camera type. Returns `None` when the text names no type,
/// leaving the default to the caller.
#[must_use]
pub fn classify_camera(raw: &str) -> Option<CameraType> {
    let lower = raw.trim().to_lowercase();

    if let Ok(camera_type) = CameraType::from_str(&lower) {
        return Some(camera_type);
    }

    if contains_any(
        &lower,
        &[
            "trajectcontrole",
            "dynamische snelheid",
            "dynamic",
            "section control",
            "average speed",
        ],
    ) {
        return Some(CameraType::DynamicSpeedCheck);
    }

    if contains_any(
        &lower,
        &[
            "flitspaal",
            "vaste flitser",
            "vaste camera",
            "roodlichtcamera",
            "fixed",
        ],
    ) {
        return Some(CameraType::FixedActive);
    }

    if contains_any(
        &lower,
        &[
            "mobiel",
            "mobile",
            "flitser",
            "flitsers",
            "laser",
            "radar",
            "snelheidscontrole",
            "controle",
        ],
    ) {
        return Some(CameraType::Mobile);
    }

    None
}

/// Decides whether a camera is explicitly active.
///
/// An explicit marker (attribute value or label) wins; otherwise the
/// raw text is searched. Negations are checked before affirmations, so
/// `"niet actief"` and `"inactief"` are never read as active.
#[must_use]
pub fn is_active(marker: Option<&str>, raw_text: &str) -> bool {
    if let Some(marker) = marker {
        let lower = marker.trim().to_lowercase();
        if is_negated(&lower) {
            return false;
        }
        if matches!(lower.as_str(), "true" | "1" | "yes" | "ja" | "on")
            || contains_any(&lower, &["actief", "active"])
        {
            return true;
        }
    }

    let lower = raw_text.to_lowercase();
    !is_negated(&lower) && contains_any(&lower, &["actief", "active", "nu gemeld"])
}

fn is_negated(lower: &str) -> bool {
    matches!(lower, "false" | "0" | "no" | "nee" | "off")
        || contains_any(
            lower,
            &[
                "niet actief",
                "inactief",
                "niet meer actief",
                "inactive",
                "not active",
                "uitgeschakeld",
            ],
        )
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_roadworks() {
        assert_eq!(classify_cause("oorzaak: wegwerkzaamheden"), CauseCategory::Roadworks);
        assert_eq!(classify_cause("Onderhoud aan de weg"), CauseCategory::Roadworks);
    }

    #[test]
    fn accident_has_priority_over_roadworks() {
        assert_eq!(
            classify_cause("ongeval bij werkzaamheden"),
            CauseCategory::Accident
        );
    }

    #[test]
    fn classifies_remaining_categories() {
        assert_eq!(classify_cause("gladheid"), CauseCategory::Weather);
        assert_eq!(classify_cause("Drukte"), CauseCategory::CongestionVolume);
        assert_eq!(classify_cause("voetbalwedstrijd"), CauseCategory::Event);
        assert_eq!(classify_cause("geen idee"), CauseCategory::Unknown);
    }

    #[test]
    fn accepts_canonical_names() {
        assert_eq!(classify_cause("congestion-volume"), CauseCategory::CongestionVolume);
        assert_eq!(classify_cause("unknown"), CauseCategory::Unknown);
    }

    #[test]
    fn classifies_camera_types_by_priority() {
        assert_eq!(classify_camera("Trajectcontrole"), Some(CameraType::DynamicSpeedCheck));
        assert_eq!(classify_camera("Flitspaal"), Some(CameraType::FixedActive));
        assert_eq!(classify_camera("vaste flitser"), Some(CameraType::FixedActive));
        assert_eq!(classify_camera("Flitser"), Some(CameraType::Mobile));
        assert_eq!(classify_camera("fixed-active"), Some(CameraType::FixedActive));
        assert_eq!(classify_camera("onbekend"), None);
    }

    #[test]
    fn activity_requires_explicit_marker() {
        assert!(is_active(Some("true"), ""));
        assert!(is_active(None, "Flitser actief"));
        assert!(!is_active(Some("niet actief"), "actief"));
        assert!(!is_active(None, "Flitser inactief"));
        assert!(!is_active(None, "Flitser bij Geldrop"));
        assert!(!is_active(Some("false"), ""));
    }
}
