//! Parsed page view shared by every extraction path.
//!
//! A [`ParsedPage`] is built either from fetched markup or from a live-DOM
//! snapshot taken by the headless renderer, so the same probes and regexes
//! run against both.

use scraper::{ElementRef, Html, Selector};

use crate::models::RenderedPage;
use crate::parse::squash_whitespace;

/// Elements whose text never counts as visible page text.
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

/// One selector candidate: a CSS selector, reading either the element's text
/// or one of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub css: &'static str,
    pub attr: Option<&'static str>,
}

impl Probe {
    pub const fn text(css: &'static str) -> Self {
        Self { css, attr: None }
    }

    pub const fn attr(css: &'static str, attr: &'static str) -> Self {
        Self {
            css,
            attr: Some(attr),
        }
    }
}

/// An anchor element found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    pub title: Option<String>,
}

pub struct ParsedPage {
    document: Html,
    text: String,
}

impl ParsedPage {
    /// Parse fetched markup.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        Self { document, text }
    }

    /// Build a page from a renderer snapshot, preferring the browser's own
    /// `innerText` over text recovered from the serialized DOM.
    pub fn from_rendered(rendered: &RenderedPage) -> Self {
        let document = Html::parse_document(&rendered.html);
        let text = match rendered.text.as_deref() {
            Some(t) if !t.trim().is_empty() => squash_whitespace(t),
            _ => visible_text(&document),
        };
        Self { document, text }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Visible text of the whole page, whitespace-collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// First non-empty value produced by `probe`.
    pub fn probe(&self, probe: &Probe) -> Option<String> {
        let selector = parse_selector(probe.css)?;
        self.document.select(&selector).find_map(|el| {
            let value = match probe.attr {
                Some(attr) => el.value().attr(attr).map(squash_whitespace),
                None => Some(element_text(&el)),
            }?;
            (!value.is_empty()).then_some(value)
        })
    }

    /// Walk `probes` in order and return the first value `convert` accepts.
    pub fn first_value<T>(&self, probes: &[Probe], convert: impl Fn(&str) -> Option<T>) -> Option<T> {
        probes
            .iter()
            .filter_map(|p| self.probe(p))
            .find_map(|raw| convert(&raw))
    }

    /// Raw contents of every `<script type="application/ld+json">` block.
    pub fn ld_json_blocks(&self) -> Vec<String> {
        let Some(selector) = parse_selector(r#"script[type="application/ld+json"]"#) else {
            return Vec::new();
        };
        self.document
            .select(&selector)
            .map(|el| el.inner_html())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    /// Every `<a href>` in document order.
    pub fn anchors(&self) -> Vec<Anchor> {
        let Some(selector) = parse_selector("a[href]") else {
            return Vec::new();
        };
        self.document
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim().to_string();
                let title = el
                    .value()
                    .attr("title")
                    .or_else(|| el.value().attr("aria-label"))
                    .map(squash_whitespace)
                    .filter(|t| !t.is_empty());
                Some(Anchor {
                    href,
                    text: element_text(&el),
                    title,
                })
            })
            .collect()
    }
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(selector = css, error = %e, "Skipping invalid selector");
            None
        }
    }
}

/// Whitespace-collapsed text of an element, skipping script/style content.
fn element_text(el: &ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| INVISIBLE.contains(&e.name())))
            .unwrap_or(false);
        if !hidden {
            parts.push(&**text);
        }
    }
    squash_whitespace(&parts.join(" "))
}

fn visible_text(document: &Html) -> String {
    element_text(&document.root_element())
}
