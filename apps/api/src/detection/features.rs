//! Feature Extractor: candidate filtering and the flat per-element feature set.
//!
//! Extraction never fails: a missing attribute is an empty string. Visibility is
//! judged from what a static snapshot carries (attributes and inline `style`).

use std::collections::BTreeMap;

use scraper::ElementRef;

use crate::detection::document::Document;
use crate::detection::labels::{resolve_label, LabelBounds};

/// `input` types eligible for classification. Missing or unknown types count as `text`.
pub const CANDIDATE_INPUT_TYPES: &[&str] = &["text", "email", "tel", "url", "number", "date", "file"];

/// Types a browser recognizes; anything else falls back to `text`.
const KNOWN_INPUT_TYPES: &[&str] = &[
    "button",
    "checkbox",
    "color",
    "date",
    "datetime-local",
    "email",
    "file",
    "hidden",
    "image",
    "month",
    "number",
    "password",
    "radio",
    "range",
    "reset",
    "search",
    "submit",
    "tel",
    "text",
    "time",
    "url",
    "week",
];

/// Containers whose content never reaches the render tree.
const UNRENDERED_CONTAINERS: &[&str] = &["template", "noscript", "head"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormContext {
    pub action: String,
    pub identifier: String,
    pub class_name: String,
}

impl FormContext {
    pub fn text(&self) -> String {
        [
            self.action.as_str(),
            self.class_name.as_str(),
            self.identifier.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementFeatures {
    pub identifier: String,
    pub name: String,
    pub placeholder: String,
    pub aria_label: String,
    pub class_name: String,
    /// Tag name: `input`, `textarea` or `select`.
    pub element_kind: String,
    /// DOM `type` semantics: `text`, `email`, …, `textarea`, `select-one`.
    pub input_type: String,
    pub data_attributes: BTreeMap<String, String>,
    pub inferred_label: String,
    pub required: bool,
    pub form_context: Option<FormContext>,
}

impl ElementFeatures {
    /// `data-name=value` pairs, space separated.
    pub fn data_attribute_text(&self) -> String {
        self.data_attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every textual feature joined and lower-cased; the haystack for keywords and patterns.
    pub fn analysis_text(&self) -> String {
        [
            self.identifier.as_str(),
            self.name.as_str(),
            self.placeholder.as_str(),
            self.inferred_label.as_str(),
            self.class_name.as_str(),
            self.aria_label.as_str(),
            self.data_attribute_text().as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

pub fn extract(doc: &Document, element: &ElementRef<'_>, bounds: &LabelBounds) -> ElementFeatures {
    let value = element.value();
    let attr = |name: &str| value.attr(name).unwrap_or_default().to_string();

    let data_attributes = value
        .attrs()
        .filter(|(name, _)| name.starts_with("data-"))
        .map(|(name, v)| (name.to_string(), v.to_string()))
        .collect();

    let form_context = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form")
        .map(|form| {
            let f = form.value();
            FormContext {
                action: f.attr("action").unwrap_or_default().to_string(),
                identifier: f.attr("id").unwrap_or_default().to_string(),
                class_name: f.attr("class").unwrap_or_default().to_string(),
            }
        });

    ElementFeatures {
        identifier: attr("id"),
        name: attr("name"),
        placeholder: attr("placeholder"),
        aria_label: attr("aria-label"),
        class_name: attr("class"),
        element_kind: value.name().to_string(),
        input_type: input_type(element),
        data_attributes,
        inferred_label: resolve_label(doc, element, bounds),
        required: value.attr("required").is_some()
            || value
                .attr("aria-required")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        form_context,
    }
}

pub fn input_type(element: &ElementRef<'_>) -> String {
    let value = element.value();
    match value.name() {
        "input" => {
            let declared = value.attr("type").unwrap_or_default().trim().to_ascii_lowercase();
            if KNOWN_INPUT_TYPES.contains(&declared.as_str()) {
                declared
            } else {
                "text".to_string()
            }
        }
        "select" if value.attr("multiple").is_some() => "select-multiple".to_string(),
        "select" => "select-one".to_string(),
        other => other.to_string(),
    }
}

pub fn is_form_control(element: &ElementRef<'_>) -> bool {
    match element.value().name() {
        "input" => CANDIDATE_INPUT_TYPES.contains(&input_type(element).as_str()),
        "textarea" | "select" => true,
        _ => false,
    }
}

pub fn is_candidate(element: &ElementRef<'_>) -> bool {
    is_form_control(element) && is_visible_and_interactable(element)
}

pub fn is_visible_and_interactable(element: &ElementRef<'_>) -> bool {
    let value = element.value();

    if value.attr("disabled").is_some() {
        return false;
    }
    if matches!(value.name(), "input" | "textarea") && value.attr("readonly").is_some() {
        return false;
    }
    if input_type(element) == "hidden" {
        return false;
    }
    if !is_rendered(element) {
        return false;
    }
    if let Some(visibility) = self_and_ancestors(element).find_map(|e| style_value(&e, "visibility")) {
        if visibility == "hidden" || visibility == "collapse" {
            return false;
        }
    }
    let transparent = style_value(element, "opacity")
        .and_then(|o| o.parse::<f64>().ok())
        .is_some_and(|o| o <= 0.0);

    !transparent
}

/// Attached to the render tree: nothing on the ancestor chain removes it from layout.
fn is_rendered(element: &ElementRef<'_>) -> bool {
    self_and_ancestors(element).all(|e| {
        let v = e.value();
        v.attr("hidden").is_none()
            && style_value(&e, "display").as_deref() != Some("none")
            && !UNRENDERED_CONTAINERS.contains(&v.name())
    })
}

fn self_and_ancestors<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(*element).chain(element.ancestors().filter_map(ElementRef::wrap))
}

/// Last inline declaration of `property`, lower-cased, without `!important`.
fn style_value(element: &ElementRef<'_>, property: &str) -> Option<String> {
    let style = element.value().attr("style")?;
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .last()
        .map(|(_, v)| {
            v.trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase()
        })
}
