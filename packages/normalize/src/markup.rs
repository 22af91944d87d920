//! Markup stripping.
//!
//! Scraped text can still carry tags, entities or decorated whitespace.
//! Everything is cleaned before resolution, and a resolved value that still
//! contains markup characters is rejected.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

/// Removes tags, decodes common entities, replaces non-breaking and other
/// decorative whitespace with plain spaces and collapses runs.
#[must_use]
pub fn strip_markup(raw: &str) -> String {
    let without_tags = TAG_RE.replace_all(raw, " ");
    let decoded = ENTITY_RE.replace_all(&without_tags, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[0]).map_or_else(|| caps[0].to_owned(), str::to_owned)
    });

    decoded
        .replace(['\u{a0}', '\u{202f}', '\u{2007}', '\u{2009}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `true` if `value` still looks like markup.
#[must_use]
pub fn contains_markup(value: &str) -> bool {
    value.contains(['<', '>', '{', '}']) || ENTITY_RE.is_match(value)
}

/// Strips markup and returns the value if something clean remains.
#[must_use]
pub fn clean(raw: Option<&str>) -> Option<String> {
    let cleaned = strip_markup(raw?);
    (!cleaned.is_empty() && !contains_markup(&cleaned)).then_some(cleaned)
}

fn decode_entity(entity: &str) -> Option<&'static str> {
    Some(match entity {
        "&amp;" => "&",
        "&nbsp;" | "&#160;" => " ",
        "&quot;" => "\"",
        "&#39;" | "&apos;" => "'",
        "&rarr;" => "→",
        "&larr;" => "←",
        "&ndash;" | "&mdash;" => "-",
        "&euml;" => "ë",
        "&eacute;" => "é",
        _ => return None,
    })
}
