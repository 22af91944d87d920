//! Tolerant parsing of delays, lengths and hectometre markers.
//!
//! Inputs are expected to have gone through [`crate::markup::strip_markup`]
//! already, so decorated whitespace is plain spaces.

use std::sync::LazyLock;

use regex::Regex;

static HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:uur|u|hours?|h)\b").expect("valid regex"));

static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*min(?:uten|uut|utes?)?\b").expect("valid regex")
});

static KM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(km|kilometers?|m|meters?)\b").expect("valid regex")
});

static HECTOMETER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hmp|hm|hectometer(?:paal)?)\s*[.:]?\s*(\d+(?:[.,]\d+)?)")
        .expect("valid regex")
});

/// Parses a delay in minutes: `"12 min"`, `"+ 12 minuten"`, `"1 uur 5 min"`,
/// `"1 u"`. Returns `None` when no duration is present.
#[must_use]
pub fn parse_delay_minutes(text: &str) -> Option<u32> {
    let hours = HOURS_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok());
    let minutes = MINUTES_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok());

    match (hours, minutes) {
        (None, None) => None,
        (h, m) => Some(h.unwrap_or(0).saturating_mul(60).saturating_add(m.unwrap_or(0))),
    }
}

/// Parses a length in kilometres: `"3.5 km"`, `"3,5 km"`, `"800 m"`.
/// Returns `None` when no length is present.
#[must_use]
pub fn parse_length_km(text: &str) -> Option<f64> {
    let caps = KM_RE.captures(text)?;
    let value = parse_decimal(&caps[1])?;
    let unit = caps[2].to_lowercase();
    let km = if unit.starts_with('k') { value } else { value / 1000.0 };
    (km.is_finite() && km >= 0.0).then_some(km)
}

/// Parses a hectometre marker. A bare number is taken as the marker
/// itself; otherwise an `hmp`/`hm`/`hectometer` label must precede it.
#[must_use]
pub fn parse_hectometer(text: &str) -> Option<f64> {
    if let Some(value) = parse_decimal(text.trim()) {
        return Some(value);
    }
    let caps = HECTOMETER_RE.captures(text)?;
    parse_decimal(&caps[1])
}

fn parse_decimal(s: &str) -> Option<f64> {
    let value = s.replace(',', ".").parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
