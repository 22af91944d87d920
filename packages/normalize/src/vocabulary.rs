//! Place and junction vocabulary.
//!
//! The vocabulary is a TOML document baked into the binary at compile
//! time via [`include_str!`]. It lists canonical city names with their
//! aliases, junction prefixes (`knooppunt`, `afrit`, ...), the
//! prepositions that introduce a direction or a location, and the report
//! words that end a place name.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

/// Embedded vocabulary for Dutch traffic reports.
const NETHERLANDS_TOML: &str = include_str!("../vocabulary/netherlands.toml");

/// A capitalised place phrase: `Utrecht`, `Den Bosch`, `'s-Hertogenbosch`.
const PLACE_PATTERN: &str = r"(?:'s[- ])?\p{Lu}[\p{L}'\-]*(?:[ ]\p{Lu}[\p{L}'\-]*)*";

static NETHERLANDS: LazyLock<Arc<Vocabulary>> = LazyLock::new(|| {
    Arc::new(Vocabulary::from_toml(NETHERLANDS_TOML).expect("embedded vocabulary is valid"))
});

/// Errors raised while loading a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    /// The TOML document is malformed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A pattern built from the vocabulary failed to compile.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// The document parsed but its contents are inconsistent.
    #[error("Invalid vocabulary: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// A canonical name with alternative spellings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    /// Canonical spelling.
    pub name: String,
    /// Alternative spellings, matched case-insensitively.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Entry {
    fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    #[serde(default)]
    direction_prepositions: Vec<String>,
    #[serde(default)]
    location_prepositions: Vec<String>,
    #[serde(default)]
    report_words: Vec<String>,
    #[serde(default)]
    junction_prefixes: Vec<Entry>,
    cities: Vec<Entry>,
}

/// Compiled vocabulary.
#[derive(Debug)]
pub struct Vocabulary {
    cities: Vec<Entry>,
    /// Lowercased city terms with the index of their city, longest first.
    city_terms: Vec<(String, usize)>,
    junction_prefixes: Vec<Entry>,
    direction_prepositions: Vec<String>,
    location_prepositions: Vec<String>,
    report_words: Vec<String>,
    direction_re: Regex,
    location_re: Regex,
    junction_re: Regex,
}

/// Returns the embedded Dutch vocabulary.
#[must_use]
pub fn netherlands() -> Arc<Vocabulary> {
    Arc::clone(&NETHERLANDS)
}

impl Vocabulary {
    /// Parses and compiles a vocabulary document.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError`] if the TOML is malformed, lists no
    /// cities, has an empty name or maps one alias to two cities.
    pub fn from_toml(toml_str: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = toml::de::from_str(toml_str)?;

        if file.cities.is_empty() {
            return Err(VocabularyError::Invalid {
                message: "no cities listed".to_string(),
            });
        }

        let mut city_terms: Vec<(String, usize)> = Vec::new();
        for (idx, city) in file.cities.iter().enumerate() {
            if city.name.trim().is_empty() {
                return Err(VocabularyError::Invalid {
                    message: format!("city #{idx} has an empty name"),
                });
            }
            for term in city.terms() {
                let lower = term.trim().to_lowercase();
                if let Some((_, other)) = city_terms.iter().find(|(t, _)| *t == lower)
                    && *other != idx
                {
                    return Err(VocabularyError::Invalid {
                        message: format!(
                            "'{term}' names both {} and {}",
                            file.cities[*other].name, city.name
                        ),
                    });
                }
                city_terms.push((lower, idx));
            }
        }
        city_terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        city_terms.dedup();

        let direction_prepositions = lowercase_all(&file.direction_prepositions);
        let location_prepositions = lowercase_all(&file.location_prepositions);
        let mut report_words = lowercase_all(&file.report_words);
        report_words.retain(|w| !w.is_empty());
        let junction_terms: Vec<String> = file
            .junction_prefixes
            .iter()
            .flat_map(Entry::terms)
            .map(str::to_lowercase)
            .collect();

        let direction_re = Regex::new(&format!(
            r"(?i:\b({}))\s+({PLACE_PATTERN})",
            alternation(&direction_prepositions)
        ))?;
        let location_re = Regex::new(&format!(
            r"(?i:\b({}))\s+({PLACE_PATTERN})",
            alternation(&location_prepositions)
        ))?;
        let junction_re = Regex::new(&format!(
            r"(?i:\b({}))\.?\s+(\d{{1,3}}[a-z]?(?:[ ]{PLACE_PATTERN})?|{PLACE_PATTERN})",
            alternation(&junction_terms)
        ))?;

        Ok(Self {
            cities: file.cities,
            city_terms,
            junction_prefixes: file.junction_prefixes,
            direction_prepositions,
            location_prepositions,
            report_words,
            direction_re,
            location_re,
            junction_re,
        })
    }

    /// Canonical city names in document order.
    pub fn city_names(&self) -> impl Iterator<Item = &str> {
        self.cities.iter().map(|c| c.name.as_str())
    }

    /// Returns the canonical name of the city mentioned earliest in `text`.
    /// When two terms start at the same position the longer one wins.
    #[must_use]
    pub fn find_city(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.city_terms
            .iter()
            .filter_map(|(term, idx)| find_term(&lower, term).map(|pos| (pos, *idx)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, idx)| self.cities[idx].name.as_str())
    }

    /// Returns the canonical name if the whole of `text` is a city term.
    #[must_use]
    pub fn exact_city(&self, text: &str) -> Option<&str> {
        let lower = text.trim().to_lowercase();
        self.city_terms
            .iter()
            .find(|(term, _)| *term == lower)
            .map(|(_, idx)| self.cities[*idx].name.as_str())
    }

    /// Finds a direction phrase such as `"richting Utrecht"`. The
    /// preposition is lowercased; the place is kept as written.
    #[must_use]
    pub fn direction(&self, text: &str) -> Option<String> {
        if let Some(caps) = self.direction_re.captures(text) {
            let place = self.trim_place(&caps[2]);
            if !place.is_empty() {
                return Some(format!("{} {place}", caps[1].to_lowercase()));
            }
        }

        // Fall back to a preposition followed by a known city in any case.
        let lower = text.to_lowercase();
        let haystack = lower.as_str();
        self.direction_prepositions
            .iter()
            .flat_map(|prep| {
                self.city_terms.iter().filter_map(move |(term, idx)| {
                    find_term(haystack, &format!("{prep} {term}")).map(|pos| (pos, prep, *idx))
                })
            })
            .min_by_key(|(pos, _, _)| *pos)
            .map(|(_, prep, idx)| format!("{prep} {}", self.cities[idx].name))
    }

    /// Finds a location phrase such as `"bij Geldrop"` and returns the
    /// place, canonicalised when it is a known city.
    #[must_use]
    pub fn location(&self, text: &str) -> Option<String> {
        let caps = self.location_re.captures(text)?;
        let place = self.trim_place(&caps[2]);
        if place.is_empty() {
            return None;
        }
        Some(self.exact_city(place).map_or_else(|| place.to_owned(), str::to_owned))
    }

    /// Finds a junction or exit reference and returns it with the
    /// canonical prefix, e.g. `"knp. Deil"` becomes `"knooppunt Deil"`.
    #[must_use]
    pub fn junction(&self, text: &str) -> Option<String> {
        let caps = self.junction_re.captures(text)?;
        let prefix = caps[1].to_lowercase();
        let canonical = self
            .junction_prefixes
            .iter()
            .find(|entry| entry.terms().any(|t| t.eq_ignore_ascii_case(&prefix)))
            .map_or(prefix.as_str(), |entry| entry.name.as_str());
        let name = self.trim_place(&caps[2]);
        if name.is_empty() {
            return None;
        }
        Some(format!("{canonical} {name}"))
    }

    /// Cuts a captured place phrase before the first report word.
    fn trim_place<'a>(&self, place: &'a str) -> &'a str {
        let place = place.trim();
        let mut end = 0;
        let mut offset = 0;
        for word in place.split(' ') {
            let lower = word.to_lowercase();
            if self.report_words.iter().any(|w| lower.starts_with(w.as_str())) {
                break;
            }
            end = offset + word.len();
            offset = end + 1;
        }
        place[..end].trim_end()
    }

    /// Removes leading direction and location prepositions.
    #[must_use]
    pub fn strip_prepositions<'a>(&self, text: &'a str) -> &'a str {
        let mut rest = text.trim();
        loop {
            let lower = rest.to_lowercase();
            let Some(prep) = self
                .direction_prepositions
                .iter()
                .chain(&self.location_prepositions)
                .find(|p| {
                    lower.starts_with(p.as_str())
                        && lower[p.len()..].chars().next().is_some_and(char::is_whitespace)
                })
            else {
                return rest;
            };
            let Some(remainder) = rest.get(prep.len()..) else {
                return rest;
            };
            rest = remainder.trim_start();
        }
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.trim().to_lowercase()).collect()
}

/// Escaped regex alternation, longest first so prefixes never shadow
/// longer terms.
fn alternation(terms: &[String]) -> String {
    let mut sorted: Vec<&String> = terms.iter().filter(|t| !t.is_empty()).collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    if sorted.is_empty() {
        // Never matches.
        return r"[^\s\S]".to_string();
    }
    sorted
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|")
}

/// Byte position of the first occurrence of `term` in `haystack` that is
/// not embedded in a longer word.
fn find_term(haystack: &str, term: &str) -> Option<usize> {
    if term.is_empty() {
        return None;
    }
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(term) {
        let at = start + offset;
        let end = at + term.len();
        let before_ok = haystack[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(at);
        }
        start = at + term.chars().next().map_or(1, char::len_utf8);
    }
    None
}
