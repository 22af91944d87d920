#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic page fetching and multi-strategy candidate extraction.
//!
//! Provides the [`ExtractionStrategy`] trait and concrete strategies for
//! the traffic list's road articles ([`strategies::road_article`]), its
//! accordion markup ([`strategies::accordion`]), embedded JSON feeds
//! ([`strategies::embedded_json`]) and flattened page text
//! ([`strategies::text_pattern`]).
//!
//! The source's markup changes shape without notice, so the [`Extractor`]
//! runs every strategy against the same [`RawSource`] and unions their
//! raw candidates. A strategy that errors or panics is isolated and
//! reported; the others still contribute. Candidates carry unnormalized
//! text only. Turning them into typed records is the normalizer's job.

pub mod fetch;
pub mod retry;
pub mod strategies;
pub mod text;

use chrono::{DateTime, Utc};
use serde::Serialize;
use traffic_monitor_traffic_models::{Provenance, StrategyKind};

/// Errors that can occur while fetching the raw source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The fetch did not complete within the configured bound.
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Reading a local source file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configured request header is not valid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Errors raised by a single extraction strategy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The fetched body contains nothing to extract from.
    #[error("source body is empty")]
    EmptySource,

    /// A CSS selector failed to parse.
    #[error("invalid CSS selector '{selector}': {message}")]
    Selector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// Embedded or top-level JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The strategy panicked.
    #[error("strategy panicked")]
    Panicked,
}

/// The fetched page or feed, shared read-only by every strategy.
#[derive(Debug, Clone)]
pub struct RawSource {
    /// Where the content came from (URL or file path).
    pub origin: String,
    /// Response body.
    pub body: String,
    /// Response `Content-Type`, if known.
    pub content_type: Option<String>,
    /// When the body was received.
    pub fetched_at: DateTime<Utc>,
}

impl RawSource {
    /// Creates a raw source from an origin and body, stamped with the
    /// current time.
    #[must_use]
    pub fn new(origin: &str, body: String) -> Self {
        Self {
            origin: origin.to_owned(),
            body,
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Returns the body, or [`ExtractError::EmptySource`] if it is blank.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptySource`] for an empty or
    /// whitespace-only body.
    pub fn require_body(&self) -> Result<&str, ExtractError> {
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            Err(ExtractError::EmptySource)
        } else {
            Ok(trimmed)
        }
    }

    /// Returns `true` if the source is a JSON document rather than HTML.
    #[must_use]
    pub fn is_json(&self) -> bool {
        if let Some(ct) = &self.content_type
            && ct.contains("json")
        {
            return true;
        }
        let trimmed = self.body.trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    }
}

/// Raw fields of a jam candidate, exactly as scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawJam {
    /// Road code text, if the strategy isolated one.
    pub road: Option<String>,
    /// Direction text.
    pub direction: Option<String>,
    /// Location or route header text (e.g. `"Eindhoven → Venlo"`).
    pub location: Option<String>,
    /// Route header of the enclosing block when `location` names a point
    /// on it, such as a junction.
    pub route: Option<String>,
    /// Delay text (e.g. `"+ 12 min"`).
    pub delay: Option<String>,
    /// Length text (e.g. `"3,5 km"`).
    pub length: Option<String>,
    /// Cause text.
    pub cause: Option<String>,
    /// All text the strategy associated with this candidate.
    pub raw_text: String,
}

/// Raw fields of a speed camera candidate, exactly as scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawCamera {
    /// Road code text.
    pub road: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Direction text.
    pub direction: Option<String>,
    /// Hectometre marker text.
    pub hectometer: Option<String>,
    /// Camera type text (e.g. `"Flitser"`, `"Trajectcontrole"`).
    pub camera_type: Option<String>,
    /// Explicit activity marker (attribute value or label).
    pub active: Option<String>,
    /// All text the strategy associated with this candidate.
    pub raw_text: String,
}

/// What one strategy found.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    /// Jam candidates in document order.
    pub jams: Vec<RawJam>,
    /// Camera candidates in document order.
    pub cameras: Vec<RawCamera>,
}

/// A raw candidate tagged with the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate<T> {
    /// Scraped fields.
    pub fields: T,
    /// Name of the strategy that found this candidate.
    pub strategy: &'static str,
    /// Kind of that strategy.
    pub kind: StrategyKind,
    /// Discovery position across the whole extraction.
    pub ordinal: usize,
}

impl<T> Candidate<T> {
    /// Returns the candidate's provenance.
    #[must_use]
    pub const fn provenance(&self) -> Provenance {
        Provenance {
            strategy: self.strategy,
            kind: self.kind,
            ordinal: self.ordinal,
        }
    }
}

/// A jam candidate with provenance.
pub type JamCandidate = Candidate<RawJam>;

/// A camera candidate with provenance.
pub type CameraCandidate = Candidate<RawCamera>;

/// Trait for one independent way of finding candidates in a raw source.
///
/// Implementations must not keep mutable state: the [`Extractor`] runs
/// them concurrently against the same source.
pub trait ExtractionStrategy: Send + Sync {
    /// Returns the name of the strategy (e.g. `"road_article"`).
    fn name(&self) -> &'static str;

    /// Returns whether the strategy reads structure or text.
    fn kind(&self) -> StrategyKind;

    /// Extracts raw candidates. Finding nothing is `Ok` with empty lists.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the source cannot be processed by this
    /// strategy.
    fn extract(&self, source: &RawSource) -> Result<StrategyOutput, ExtractError>;
}

/// Per-strategy outcome of one extraction, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyReport {
    /// Strategy name.
    pub strategy: &'static str,
    /// Strategy kind.
    pub kind: StrategyKind,
    /// Number of jam candidates found.
    pub jams: usize,
    /// Number of camera candidates found.
    pub cameras: usize,
    /// Error message if the strategy failed.
    pub error: Option<String>,
}

/// The union of every strategy's candidates.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Jam candidates, in strategy registry order then document order.
    pub jams: Vec<JamCandidate>,
    /// Camera candidates, in strategy registry order then document order.
    pub cameras: Vec<CameraCandidate>,
    /// One report per strategy, in registry order.
    pub reports: Vec<StrategyReport>,
}

impl Extraction {
    /// Returns `true` if every strategy failed. An extraction where all
    /// strategies succeeded but found nothing is not a failure.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(|r| r.error.is_some())
    }

    /// Returns the error messages of the strategies that failed.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.strategy)))
            .collect()
    }
}

/// Runs a fixed, ordered set of strategies and unions their output.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(strategies::default_strategies())
    }
}

impl Extractor {
    /// Creates an extractor over the given strategies. Their order is the
    /// union order and therefore the deduplication discovery order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the names of the configured strategies, in order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs every strategy on its own scoped thread and merges the results.
    ///
    /// Never fails as a whole: strategy errors and panics end up in the
    /// corresponding [`StrategyReport`].
    #[must_use]
    pub fn extract(&self, source: &RawSource) -> Extraction {
        let results: Vec<Result<StrategyOutput, ExtractError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .strategies
                .iter()
                .map(|strategy| scope.spawn(move || strategy.extract(source)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(ExtractError::Panicked)))
                .collect()
        });

        let mut extraction = Extraction::default();
        let mut ordinal = 0usize;

        for (strategy, result) in self.strategies.iter().zip(results) {
            let name = strategy.name();
            let kind = strategy.kind();

            match result {
                Ok(output) => {
                    log::debug!(
                        "Strategy {name}: {} jam candidates, {} camera candidates",
                        output.jams.len(),
                        output.cameras.len()
                    );
                    extraction.reports.push(StrategyReport {
                        strategy: name,
                        kind,
                        jams: output.jams.len(),
                        cameras: output.cameras.len(),
                        error: None,
                    });
                    for fields in output.jams {
                        extraction.jams.push(Candidate {
                            fields,
                            strategy: name,
                            kind,
                            ordinal,
                        });
                        ordinal += 1;
                    }
                    for fields in output.cameras {
                        extraction.cameras.push(Candidate {
                            fields,
                            strategy: name,
                            kind,
                            ordinal,
                        });
                        ordinal += 1;
                    }
                }
                Err(e) => {
                    log::warn!("Strategy {name} failed on {}: {e}", source.origin);
                    extraction.reports.push(StrategyReport {
                        strategy: name,
                        kind,
                        jams: 0,
                        cameras: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        log::info!(
            "Extraction complete: {} jam candidates, {} camera candidates from {} strategies ({} failed)",
            extraction.jams.len(),
            extraction.cameras.len(),
            extraction.reports.len(),
            extraction.reports.iter().filter(|r| r.error.is_some()).count()
        );

        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, usize);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Structural
        }

        fn extract(&self, _source: &RawSource) -> Result<StrategyOutput, ExtractError> {
            Ok(StrategyOutput {
                jams: (0..self.1)
                    .map(|i| RawJam {
                        road: Some("A2".to_string()),
                        raw_text: format!("{} #{i}", self.0),
                        ..RawJam::default()
                    })
                    .collect(),
                cameras: Vec::new(),
            })
        }
    }

    struct Failing;

    impl ExtractionStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Text
        }

        fn extract(&self, _source: &RawSource) -> Result<StrategyOutput, ExtractError> {
            Err(ExtractError::EmptySource)
        }
    }

    struct Panicking;

    impl ExtractionStrategy for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Text
        }

        fn extract(&self, _source: &RawSource) -> Result<StrategyOutput, ExtractError> {
            panic!("selector drift");
        }
    }

    fn source() -> RawSource {
        RawSource::new("test", "<html></html>".to_string())
    }

    #[test]
    fn unions_in_registry_order_with_ordinals() {
        let extractor = Extractor::new(vec![Box::new(Fixed("first", 2)), Box::new(Fixed("second", 1))]);
        let extraction = extractor.extract(&source());

        let tags: Vec<(&str, usize)> = extraction
            .jams
            .iter()
            .map(|c| (c.strategy, c.ordinal))
            .collect();
        assert_eq!(tags, [("first", 0), ("first", 1), ("second", 2)]);
        assert!(!extraction.all_failed());
    }

    #[test]
    fn isolates_failing_and_panicking_strategies() {
        let extractor = Extractor::new(vec![
            Box::new(Failing),
            Box::new(Fixed("ok", 1)),
            Box::new(Panicking),
        ]);
        let extraction = extractor.extract(&source());

        assert_eq!(extraction.jams.len(), 1);
        assert_eq!(extraction.reports.len(), 3);
        assert!(extraction.reports[0].error.is_some());
        assert!(extraction.reports[1].error.is_none());
        assert_eq!(extraction.reports[2].error.as_deref(), Some("strategy panicked"));
        assert!(!extraction.all_failed());
        assert_eq!(extraction.failures().len(), 2);
    }

    #[test]
    fn all_failed_only_when_every_strategy_errors() {
        let extractor = Extractor::new(vec![Box::new(Failing), Box::new(Panicking)]);
        assert!(extractor.extract(&source()).all_failed());

        let empty = Extractor::new(vec![Box::new(Fixed("empty", 0))]);
        let extraction = empty.extract(&source());
        assert!(!extraction.all_failed());
        assert!(extraction.jams.is_empty());
    }

    #[test]
    fn detects_json_sources() {
        assert!(RawSource::new("x", " {\"roads\": []}".to_string()).is_json());
        assert!(
            RawSource::new("x", "<html/>".to_string())
                .with_content_type(Some("application/json; charset=utf-8".to_string()))
                .is_json()
        );
        assert!(!source().is_json());
    }

    #[test]
    fn blank_body_is_empty_source() {
        let blank = RawSource::new("x", "  \n ".to_string());
        assert!(matches!(blank.require_body(), Err(ExtractError::EmptySource)));
    }
}
