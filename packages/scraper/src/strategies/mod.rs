//! Concrete extraction strategies.
//!
//! [`default_strategies`] returns them in registry order. The order is
//! significant: it is the union order of candidates and thus the last
//! tie-break during deduplication.

pub mod accordion;
pub mod embedded_json;
pub mod road_article;
pub mod text_pattern;

use std::sync::LazyLock;

use regex::Regex;

use crate::ExtractionStrategy;

/// Keywords that mark a snippet as a speed camera report.
pub(crate) const CAMERA_KEYWORDS: &[&str] = &[
    "flits",
    "radar",
    "snelheidscontrole",
    "trajectcontrole",
    "camera",
    "speed check",
    "laser",
];

/// Any camera keyword, case-insensitively.
pub(crate) static CAMERA_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = CAMERA_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).expect("valid regex")
});

/// Delay snippet such as `"+ 12 min"` or `"1 uur 5 min"`.
pub(crate) static DELAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\+?\s*(?:\d+\s*(?:uur|u)\s*)?\d+\s*(?:min(?:uten|uut)?|minutes?)\b|\+?\s*\d+\s*(?:uur|u)\b")
        .expect("valid regex")
});

/// Length snippet such as `"3,5 km"`.
pub(crate) static LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+(?:[.,]\d+)?\s*km\b").expect("valid regex"));

/// Returns every strategy in registry order.
#[must_use]
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(road_article::RoadArticleStrategy),
        Box::new(accordion::AccordionStrategy),
        Box::new(embedded_json::EmbeddedJsonStrategy),
        Box::new(text_pattern::TextPatternStrategy::default()),
    ]
}

/// Returns `true` if `text` mentions a speed camera.
pub(crate) fn mentions_camera(text: &str) -> bool {
    let lower = text.to_lowercase();
    CAMERA_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Returns the first delay snippet in `text`, trimmed.
pub(crate) fn find_delay(text: &str) -> Option<String> {
    DELAY_RE
        .find(text)
        .map(|m| m.as_str().trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Returns the first length snippet in `text`.
pub(crate) fn find_length(text: &str) -> Option<String> {
    LENGTH_RE.find(text).map(|m| m.as_str().to_owned())
}
