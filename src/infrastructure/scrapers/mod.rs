pub(crate) mod locator;
pub(crate) mod matches;
pub(crate) mod operators;
pub(crate) mod overview;

use crate::domain::SENTINEL;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use unicode_normalization::UnicodeNormalization;

const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

pub(crate) fn parse_selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|css| Selector::parse(css).expect("valid selector"))
        .collect()
}

pub fn normalize_text(raw: &str) -> String {
    raw.nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn element_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_visible_text(element, &mut parts);
    normalize_text(&parts.join(" "))
}

fn collect_visible_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    if INVISIBLE_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            parts.push(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_visible_text(child_element, parts);
        }
    }
}

/// Collapses repeated slash-separated segments: `"1,697h / 1,697h"` becomes
/// `"1,697h"`. Applying it twice gives the same result as applying it once.
pub fn dedupe_slash_segments(value: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for part in value.split('/').map(str::trim).filter(|p| !p.is_empty()) {
        if !seen.contains(&part) {
            seen.push(part);
        }
    }
    seen.join(" / ")
}

pub(crate) fn first_text(context: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        context
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

pub(crate) fn first_attr(
    context: ElementRef<'_>,
    selectors: &[Selector],
    attr: &str,
) -> Option<String> {
    selectors.iter().find_map(|selector| {
        context
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

pub(crate) fn text_without(container: ElementRef<'_>, label: &str) -> Option<String> {
    let full = element_text(container);
    let remainder = match full.find(label) {
        Some(pos) => format!("{}{}", &full[..pos], &full[pos + label.len()..]),
        None => return None,
    };
    let remainder = normalize_text(&remainder);
    (!remainder.is_empty()).then_some(remainder)
}

pub(crate) fn or_sentinel(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| SENTINEL.to_string())
}

static NOT_FOUND_MARKERS: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(&[".trn-error", ".error-page", ".page-404"]));

static HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3").expect("valid heading selector"));

const NOT_FOUND_PHRASES: &[&str] = &["player not found", "profile not found", "404 not found"];

/// True when the document is the tracker's "no such player" page: an error
/// container, or a heading that reads as a not-found message.
pub fn is_not_found_page(root: ElementRef<'_>) -> bool {
    if NOT_FOUND_MARKERS
        .iter()
        .any(|selector| root.select(selector).next().is_some())
    {
        return true;
    }

    root.select(&HEADINGS).any(|heading| {
        let text = element_text(heading).to_lowercase();
        NOT_FOUND_PHRASES.iter().any(|phrase| text.starts_with(phrase))
    })
}
