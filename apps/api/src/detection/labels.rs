//! Label Proximity Resolver.
//!
//! Most application forms do not wire `<label for>` correctly, so the visible
//! caption has to be found near the element. Lookup order:
//! 1. `<label for="{id}">`
//! 2. the enclosing `<label>`
//! 3. if the text so far is thin: up to `max_depth` ancestors, nearest first
//! 4. always: up to `max_siblings` preceding sibling elements, nearest first
//!
//! Neighborhood snippets longer than `max_snippet_chars`, or without a single
//! alphanumeric character, are dropped.

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::detection::document::{text_content, Document};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelBounds {
    pub max_depth: usize,
    pub max_siblings: usize,
    pub max_snippet_chars: usize,
    /// Explicit label text with fewer alphanumeric chars than this triggers the neighborhood walk.
    pub thin_label_chars: usize,
}

impl Default for LabelBounds {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_siblings: 3,
            max_snippet_chars: 50,
            thin_label_chars: 2,
        }
    }
}

pub fn resolve_label(doc: &Document, element: &ElementRef<'_>, bounds: &LabelBounds) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(id) = element.value().id().filter(|id| !id.is_empty()) {
        if let Some(text) = doc.label_for(id).filter(|t| !t.is_empty()) {
            parts.push(text.to_string());
        }
    }

    if let Some(container) = enclosing_label(element) {
        let text = text_content(&container);
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if is_thin(&parts, bounds.thin_label_chars) {
        parts.extend(ancestor_snippets(element, bounds));
    }
    parts.extend(sibling_snippets(element, bounds));

    parts.join(" ")
}

fn enclosing_label<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label")
}

fn ancestor_snippets(element: &ElementRef<'_>, bounds: &LabelBounds) -> Vec<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(bounds.max_depth)
        .filter_map(|a| snippet(&a, bounds))
        .collect()
}

fn sibling_snippets(element: &ElementRef<'_>, bounds: &LabelBounds) -> Vec<String> {
    element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .take(bounds.max_siblings)
        .filter_map(|s| snippet(&s, bounds))
        .collect()
}

fn snippet(element: &ElementRef<'_>, bounds: &LabelBounds) -> Option<String> {
    let text = text_content(element);
    is_label_like(&text, bounds.max_snippet_chars).then_some(text)
}

/// Short, and more than just punctuation or whitespace. Longer text is prose, not a label.
pub fn is_label_like(text: &str, max_chars: usize) -> bool {
    text.chars().count() <= max_chars && text.chars().any(char::is_alphanumeric)
}

fn is_thin(parts: &[String], min_chars: usize) -> bool {
    let meaningful: usize = parts
        .iter()
        .map(|p| p.chars().filter(|c| c.is_alphanumeric()).count())
        .sum();
    meaningful < min_chars
}
