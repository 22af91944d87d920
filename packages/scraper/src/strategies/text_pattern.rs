//! Text pattern strategy.
//!
//! Ignores markup entirely. The readable page text is split into segments
//! starting at each road-code mention. Within a segment every camera
//! mention opens a sub-segment that runs from the last clause boundary
//! before the keyword to the next camera mention; each becomes a camera
//! candidate. The text before the first camera mention becomes a jam
//! candidate if it mentions a disruption keyword. This keeps working when
//! every selector the structural strategies rely on has changed.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use traffic_monitor_traffic_models::StrategyKind;

use crate::text::document_text;
use crate::{ExtractError, ExtractionStrategy, RawCamera, RawJam, RawSource, StrategyOutput};

use super::{CAMERA_RE, DELAY_RE, LENGTH_RE};

static ROAD_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[AN]\d{1,3}\b").expect("valid regex"));

static HECTOMETER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhmp?\.?\s*\d+(?:[.,]\d)?").expect("valid regex"));

const JAM_KEYWORDS: &[&str] = &[
    "min",
    "vertraging",
    "file",
    "km",
    "afgesloten",
    "ongeval",
    "werkzaamheden",
    "langzaam rijdend",
    "stilstaand",
];

/// Text strategy over the flattened document text.
#[derive(Debug, Clone, Copy)]
pub struct TextPatternStrategy {
    max_segment_chars: usize,
}

impl Default for TextPatternStrategy {
    fn default() -> Self {
        Self {
            max_segment_chars: 300,
        }
    }
}

impl TextPatternStrategy {
    /// Caps each segment at `chars` characters.
    #[must_use]
    pub const fn with_max_segment_chars(mut self, chars: usize) -> Self {
        self.max_segment_chars = chars;
        self
    }

    fn segments<'a>(&self, text: &'a str) -> Vec<(&'a str, &'a str)> {
        let mentions: Vec<_> = ROAD_MENTION_RE.find_iter(text).collect();

        mentions
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let end = mentions.get(i + 1).map_or(text.len(), |next| next.start());
                let segment = truncate_chars(&text[m.start()..end], self.max_segment_chars);
                (m.as_str(), segment.trim())
            })
            .collect()
    }
}

impl ExtractionStrategy for TextPatternStrategy {
    fn name(&self) -> &'static str {
        "text_pattern"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    fn extract(&self, source: &RawSource) -> Result<StrategyOutput, ExtractError> {
        let body = source.require_body()?;
        let mut output = StrategyOutput::default();

        if source.is_json() {
            return Ok(output);
        }

        let text = document_text(&Html::parse_document(body));
        let flat = text.replace('\n', " ");

        for (road, segment) in self.segments(&flat) {
            let (head, cameras) = split_cameras(segment, road.len());

            if mentions_jam(head) {
                output.jams.push(RawJam {
                    road: Some(road.to_owned()),
                    raw_text: head.to_owned(),
                    ..RawJam::default()
                });
            }
            for camera in cameras {
                output.cameras.push(RawCamera {
                    road: Some(road.to_owned()),
                    raw_text: camera.to_owned(),
                    ..RawCamera::default()
                });
            }
        }

        Ok(output)
    }
}

/// Splits a road segment into the text before its first camera mention
/// and one sub-segment per camera mention. Camera keywords with no clause
/// boundary between them belong to the same mention.
fn split_cameras(segment: &str, road_end: usize) -> (&str, Vec<&str>) {
    let boundaries = clause_boundaries(segment, road_end);
    let mut starts: Vec<usize> = Vec::new();

    for keyword in CAMERA_RE.find_iter(segment) {
        let start = boundaries
            .iter()
            .copied()
            .filter(|b| *b <= keyword.start())
            .max()
            .unwrap_or(road_end);
        if starts.last().is_some_and(|prev| start <= *prev) {
            continue;
        }
        starts.push(start);
    }

    let Some(&first) = starts.first() else {
        return (segment, Vec::new());
    };

    let cameras = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(segment.len());
            segment[start..end].trim()
        })
        .filter(|s| !s.is_empty())
        .collect();

    (segment[..first].trim(), cameras)
}

/// Byte offsets where a clause ends: after the road code, after a delay,
/// length or hectometre snippet, and after punctuation followed by
/// whitespace.
fn clause_boundaries(segment: &str, road_end: usize) -> Vec<usize> {
    let mut boundaries = vec![road_end];
    boundaries.extend(DELAY_RE.find_iter(segment).map(|m| m.end()));
    boundaries.extend(LENGTH_RE.find_iter(segment).map(|m| m.end()));
    boundaries.extend(HECTOMETER_RE.find_iter(segment).map(|m| m.end()));
    boundaries.extend(
        segment
            .match_indices([',', ';', ':', '|', '.'])
            .map(|(i, _)| i + 1)
            .filter(|&end| segment[end..].chars().next().is_none_or(char::is_whitespace)),
    );
    boundaries
}

fn mentions_jam(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    JAM_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}
