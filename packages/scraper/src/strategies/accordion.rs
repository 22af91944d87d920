//! Accordion strategy.
//!
//! Newer renderings of the traffic list wrap each road in an
//! `article[data-accordion-road]` whose road code lives in the attribute
//! rather than in a child span. Items are matched with loose
//! `data-test-id*=` and class selectors, falling back to broader class
//! patterns when the specific ones find nothing.

use scraper::{ElementRef, Html, Selector};
use traffic_monitor_traffic_models::StrategyKind;

use crate::text::{element_text, first_text, parse_selector};
use crate::{ExtractError, ExtractionStrategy, RawCamera, RawJam, RawSource, StrategyOutput};

use super::{find_delay, find_length, mentions_camera};

const ITEM_SELECTOR: &str =
    "div[data-test-id*='traffic-item'], li[data-test-id*='traffic-item'], .traffic-item";
const FALLBACK_ITEM_SELECTOR: &str = "div[class*='traffic'], li[class*='jam'], .file-item";
const CAMERA_SELECTOR: &str =
    "[data-test-id*='radar'], [class*='radar'], [class*='flits'], [class*='camera']";

/// Structural strategy over accordion-style road blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccordionStrategy;

impl ExtractionStrategy for AccordionStrategy {
    fn name(&self) -> &'static str {
        "accordion"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn extract(&self, source: &RawSource) -> Result<StrategyOutput, ExtractError> {
        let body = source.require_body()?;
        let article_selector = parse_selector("article[data-accordion-road]")?;
        let totals = parse_selector("[data-test-id='traffic-list-road-totals']")?;
        let items = parse_selector(ITEM_SELECTOR)?;
        let fallback_items = parse_selector(FALLBACK_ITEM_SELECTOR)?;
        let cameras = parse_selector(CAMERA_SELECTOR)?;
        let heading = parse_selector("h3, h4, strong")?;

        let document = Html::parse_document(body);
        let mut output = StrategyOutput::default();

        for article in document.select(&article_selector) {
            let Some(road) = article
                .value()
                .attr("data-accordion-road")
                .map(str::trim)
                .filter(|r| !r.is_empty())
            else {
                continue;
            };

            for camera in article.select(&cameras) {
                let text = element_text(camera);
                if text.is_empty() {
                    continue;
                }
                output.cameras.push(RawCamera {
                    road: Some(road.to_owned()),
                    location: first_text(camera, &heading),
                    direction: None,
                    hectometer: camera.value().attr("data-hectometer").map(str::to_owned),
                    camera_type: camera.value().attr("data-camera-type").map(str::to_owned),
                    active: camera.value().attr("data-active").map(str::to_owned),
                    raw_text: text,
                });
            }

            let mut jam_items = jam_items(article, &items);
            if jam_items.is_empty() {
                jam_items = jam_items_fallback(article, &fallback_items);
            }

            if jam_items.is_empty() {
                // Only the road summary is rendered.
                if let Some(summary) = first_text(article, &totals) {
                    output.jams.push(RawJam {
                        road: Some(road.to_owned()),
                        location: first_text(article, &heading),
                        delay: find_delay(&summary),
                        length: find_length(&summary),
                        raw_text: summary,
                        ..RawJam::default()
                    });
                }
                continue;
            }

            for item in jam_items {
                let text = element_text(item);
                output.jams.push(RawJam {
                    road: Some(road.to_owned()),
                    location: first_text(item, &heading),
                    delay: find_delay(&text),
                    length: find_length(&text),
                    raw_text: text,
                    ..RawJam::default()
                });
            }
        }

        Ok(output)
    }
}

fn jam_items<'a>(article: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    article
        .select(selector)
        .filter(|item| {
            let text = element_text(*item);
            !text.is_empty() && !mentions_camera(&text)
        })
        .collect()
}

/// The fallback class patterns also match wrappers, so only keep leaf-most
/// matches: items that contain no other match.
fn jam_items_fallback<'a>(article: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    let candidates = jam_items(article, selector);
    candidates
        .iter()
        .copied()
        .filter(|item| {
            !candidates
                .iter()
                .any(|other| other.id() != item.id() && other.ancestors().any(|a| a.id() == item.id()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(body: &str) -> StrategyOutput {
        AccordionStrategy
            .extract(&RawSource::new("test", body.to_string()))
            .unwrap()
    }

    #[test]
    fn reads_road_from_attribute() {
        let output = run(r#"
            <article data-accordion-road="A58">
              <li data-test-id="traffic-item-1"><strong>Breda - Tilburg</strong> + 8 min 2 km</li>
              <li class="radar-item" data-active="true"><strong>Gilze</strong> Flitser</li>
            </article>"#);

        assert_eq!(output.jams.len(), 1);
        assert_eq!(output.jams[0].road.as_deref(), Some("A58"));
        assert_eq!(output.jams[0].location.as_deref(), Some("Breda - Tilburg"));
        assert_eq!(output.jams[0].delay.as_deref(), Some("+ 8 min"));

        assert_eq!(output.cameras.len(), 1);
        assert_eq!(output.cameras[0].location.as_deref(), Some("Gilze"));
        assert_eq!(output.cameras[0].active.as_deref(), Some("true"));
    }

    #[test]
    fn falls_back_to_leaf_class_matches() {
        let output = run(r#"
            <article data-accordion-road="A16">
              <div class="traffic-wrapper">
                <div class="traffic-row">Rotterdam - Breda + 15 min</div>
              </div>
            </article>"#);

        assert_eq!(output.jams.len(), 1);
        assert_eq!(output.jams[0].delay.as_deref(), Some("+ 15 min"));
    }

    #[test]
    fn uses_totals_when_no_items() {
        let output = run(r#"
            <article data-accordion-road="A73">
              <h3>Maasbracht - Nijmegen</h3>
              <div data-test-id="traffic-list-road-totals">+ 6 min, 1,5 km</div>
            </article>"#);

        assert_eq!(output.jams.len(), 1);
        assert_eq!(output.jams[0].length.as_deref(), Some("1,5 km"));
        assert_eq!(output.jams[0].location.as_deref(), Some("Maasbracht - Nijmegen"));
    }

    #[test]
    fn ignores_pages_without_accordions() {
        let output = run("<html><body><p>A2 file</p></body></html>");
        assert!(output.jams.is_empty());
    }
}
