use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Personal,
    Education,
    Experience,
    Project,
    Skills,
    Social,
    Other,
    File,
}

impl FieldCategory {
    /// Form action/id/class keywords that mark a form as relevant to this category.
    pub fn form_context_keywords(self) -> &'static [&'static str] {
        match self {
            FieldCategory::Personal => &["profile", "personal", "contact", "个人", "联系"],
            FieldCategory::Education => &["education", "school", "study", "教育", "学习"],
            FieldCategory::Experience => &["experience", "work", "job", "工作", "经验"],
            FieldCategory::Project => &["project", "portfolio", "项目", "作品"],
            FieldCategory::Skills => &["skill", "ability", "技能", "能力"],
            FieldCategory::Social | FieldCategory::Other | FieldCategory::File => &[],
        }
    }
}

/// Non-owning pointer back to a document element.
///
/// `ordinal` is the element's index among all elements of the parsed document in
/// document order, so it stays valid for as long as the snapshot is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementLocator {
    pub ordinal: usize,
    pub tag: String,
    /// `#id`, `tag[name="…"]` or the bare tag, for logs and debugging.
    pub hint: String,
}

/// Best field type for one element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub field_type: String,
    pub element: ElementLocator,
    pub score: u32,
    pub confidence: f64,
    pub category: FieldCategory,
    pub match_reason: String,
}

/// Aggregate view of a scan, the numbers a host reports to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionSummary {
    pub total_fields: usize,
    pub field_types: BTreeMap<String, usize>,
    pub high_confidence_fields: usize,
}

impl DetectionSummary {
    pub fn from_matches(matches: &[MatchResult], high_confidence: f64) -> Self {
        let mut field_types = BTreeMap::new();
        for m in matches {
            *field_types.entry(m.field_type.clone()).or_insert(0) += 1;
        }
        Self {
            total_fields: matches.len(),
            field_types,
            high_confidence_fields: matches
                .iter()
                .filter(|m| m.confidence >= high_confidence)
                .count(),
        }
    }
}
