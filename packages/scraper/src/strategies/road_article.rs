//! Road article strategy.
//!
//! Reads the traffic list's `article[data-test-id="traffic-list-road"]`
//! blocks. Each article carries its road number in a dedicated span and a
//! route header in its `h3`. When the article lists individual items each
//! item becomes a candidate; otherwise the article itself is one jam
//! candidate built from its header and `body-text` spans.

use scraper::{ElementRef, Html, Selector};
use traffic_monitor_traffic_models::StrategyKind;

use crate::text::{element_text, first_text, parse_selector};
use crate::{ExtractError, ExtractionStrategy, RawCamera, RawJam, RawSource, StrategyOutput};

use super::{find_delay, find_length, mentions_camera};

/// Structural strategy over the traffic list's road articles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoadArticleStrategy;

struct Selectors {
    article: Selector,
    road_number: Selector,
    header: Selector,
    body_spans: Selector,
    item: Selector,
    direction: Selector,
    cause: Selector,
    location: Selector,
    hectometer: Selector,
    empty_state: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            article: parse_selector(r#"article[data-test-id="traffic-list-road"]"#)?,
            road_number: parse_selector(r#"[data-test-id="traffic-list-road-road-number"]"#)?,
            header: parse_selector("h3")?,
            body_spans: parse_selector(r#"[data-test="body-text"] span"#)?,
            item: parse_selector(r#"[data-test-id*="traffic-item"], [data-test-id*="radar-item"]"#)?,
            direction: parse_selector(r#"[data-test-id*="direction"]"#)?,
            cause: parse_selector(r#"[data-test-id*="cause"], [data-test-id*="reason"]"#)?,
            location: parse_selector(r#"h4, [data-test-id*="location"]"#)?,
            hectometer: parse_selector(r#"[data-test-id*="hectometer"]"#)?,
            empty_state: parse_selector(r#"[data-test-id="traffic-list-roads-empty"]"#)?,
        })
    }
}

impl ExtractionStrategy for RoadArticleStrategy {
    fn name(&self) -> &'static str {
        "road_article"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn extract(&self, source: &RawSource) -> Result<StrategyOutput, ExtractError> {
        let body = source.require_body()?;
        let selectors = Selectors::new()?;
        let document = Html::parse_document(body);

        if document.select(&selectors.empty_state).next().is_some() {
            log::info!("Traffic list shows its empty state");
        }

        let mut output = StrategyOutput::default();
        let mut articles = 0usize;

        for article in document.select(&selectors.article) {
            articles += 1;
            let Some(road) = first_text(article, &selectors.road_number) else {
                log::debug!("Road article {articles} has no road number, skipping");
                continue;
            };
            extract_article(article, &road, &selectors, &mut output);
        }

        log::debug!("Found {articles} road articles");
        Ok(output)
    }
}

fn extract_article(
    article: ElementRef<'_>,
    road: &str,
    selectors: &Selectors,
    output: &mut StrategyOutput,
) {
    let header = first_text(article, &selectors.header);
    let items: Vec<ElementRef<'_>> = article.select(&selectors.item).collect();

    if items.is_empty() {
        if let Some(jam) = article_jam(article, road, header, selectors) {
            output.jams.push(jam);
        }
        return;
    }

    for item in items {
        let text = element_text(item);
        if text.is_empty() {
            continue;
        }
        let test_id = item.value().attr("data-test-id").unwrap_or_default();

        if test_id.contains("radar") || mentions_camera(&text) {
            output.cameras.push(RawCamera {
                road: Some(road.to_owned()),
                location: first_text(item, &selectors.location).or_else(|| header.clone()),
                direction: first_text(item, &selectors.direction),
                hectometer: first_text(item, &selectors.hectometer),
                camera_type: item.value().attr("data-camera-type").map(str::to_owned),
                active: item.value().attr("data-active").map(str::to_owned),
                raw_text: text,
            });
        } else {
            output.jams.push(RawJam {
                road: Some(road.to_owned()),
                direction: first_text(item, &selectors.direction),
                location: first_text(item, &selectors.location).or_else(|| header.clone()),
                route: header.clone(),
                delay: find_delay(&text),
                length: find_length(&text),
                cause: first_text(item, &selectors.cause),
                raw_text: text,
            });
        }
    }
}

/// Builds the article-level jam from the header and the `body-text`
/// spans: a span containing `min` is the delay, one containing `km` the
/// length. Articles with none of the three are skipped.
fn article_jam(
    article: ElementRef<'_>,
    road: &str,
    header: Option<String>,
    selectors: &Selectors,
) -> Option<RawJam> {
    let mut delay = None;
    let mut length = None;

    for span in article.select(&selectors.body_spans) {
        let text = element_text(span);
        if text.contains("min") {
            delay = Some(text);
        } else if text.contains("km") {
            length = Some(text);
        }
    }

    if header.is_none() && delay.is_none() && length.is_none() {
        log::debug!("Road article for {road} carries no details, skipping");
        return None;
    }

    Some(RawJam {
        road: Some(road.to_owned()),
        direction: first_text(article, &selectors.direction),
        location: header,
        route: None,
        delay,
        length,
        cause: first_text(article, &selectors.cause),
        raw_text: element_text(article),
    })
}
