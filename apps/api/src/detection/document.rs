//! Parsed document snapshot. Wraps `scraper::Html` with the lookups the
//! extractor needs: document-order element enumeration and the `label[for]` index.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::detection::models::ElementLocator;

static LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("label").expect("Invalid selector"));

pub struct Document {
    html: Html,
    /// `for` attribute -> text of the first label carrying it.
    label_index: HashMap<String, String>,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);

        let mut label_index = HashMap::new();
        for label in html.select(&LABEL_SELECTOR) {
            if let Some(target) = label.value().attr("for") {
                if target.is_empty() {
                    continue;
                }
                label_index
                    .entry(target.to_string())
                    .or_insert_with(|| text_content(&label));
            }
        }

        Self { html, label_index }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Every element in document order. The position in this sequence is the
    /// element's ordinal.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }

    /// Text of the first `<label for="{id}">`, if any.
    pub fn label_for(&self, id: &str) -> Option<&str> {
        self.label_index.get(id).map(String::as_str)
    }
}

/// Concatenated descendant text, whitespace-collapsed.
pub fn text_content(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn locator(ordinal: usize, element: &ElementRef<'_>) -> ElementLocator {
    let value = element.value();
    let tag = value.name().to_string();
    let hint = match (value.id(), value.attr("name")) {
        (Some(id), _) if !id.is_empty() => format!("#{id}"),
        (_, Some(name)) if !name.is_empty() => format!("{tag}[name=\"{name}\"]"),
        _ => tag.clone(),
    };
    ElementLocator { ordinal, tag, hint }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elements_are_in_document_order() {
        let doc = Document::parse(
            r#"<html><body><form><input id="a"><div><input id="b"></div><textarea id="c"></textarea></form></body></html>"#,
        );
        let ids: Vec<&str> = doc
            .elements()
            .filter_map(|el| el.value().id())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_label_for_wins() {
        let doc = Document::parse(
            r#"<label for="email">  Work
                 email </label><label for="email">Other</label><input id="email">"#,
        );
        assert_eq!(doc.label_for("email"), Some("Work email"));
        assert_eq!(doc.label_for("phone"), None);
    }

    #[test]
    fn test_empty_for_attribute_is_ignored() {
        let doc = Document::parse(r#"<label for="">Name</label><input id="">"#);
        assert_eq!(doc.label_for(""), None);
    }

    #[test]
    fn test_locator_hint_prefers_id_then_name() {
        let doc = Document::parse(
            r#"<input id="user_email" name="email"><input name="phone"><select></select>"#,
        );
        let hints: Vec<String> = doc
            .elements()
            .enumerate()
            .filter(|(_, el)| matches!(el.value().name(), "input" | "select"))
            .map(|(ordinal, el)| locator(ordinal, &el).hint)
            .collect();
        assert_eq!(hints, vec!["#user_email", "input[name=\"phone\"]", "select"]);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  First\n\t name  "), "First name");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
