//! Text helpers shared by the HTML strategies.

use scraper::{ElementRef, Html, Node, Selector};

use crate::ExtractError;

/// Elements whose text never reaches a reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Parses a CSS selector string into a [`Selector`].
///
/// # Errors
///
/// Returns [`ExtractError::Selector`] if the selector is invalid.
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

/// Collapses every run of whitespace to a single space and trims.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the visible text of an element with whitespace collapsed.
#[must_use]
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Returns the text of the first match of `selector` under `el`, if it is
/// non-empty.
#[must_use]
pub fn first_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Returns the readable text of a whole document, one text node per line.
///
/// Text inside scripts, styles and other hidden elements is skipped.
#[must_use]
pub fn document_text(document: &Html) -> String {
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let line = collapse_whitespace(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}
