//! Scoring Engine: additive, table-driven scoring of one element against every rule.
//!
//! Algorithm, per rule:
//! 1. each keyword matching the analysis text → `base_priority`, plus flat bonuses when it
//!    also matches the id/name, placeholder or aria-label
//! 2. each pattern matching the analysis text → `base_priority + pattern_bonus`
//! 3. element kind accepted by the rule → `kind_bonus`
//! 4. signal bonuses (email input, phone, resume upload, required, data attributes, form context)
//! 5. site overrides → `site_override_bonus` per active platform whose selectors hit
//!
//! Selection keeps the strictly highest score (declaration order breaks ties) and drops it
//! unless it exceeds `min_score`. Every number lives in `ScoringWeights`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::detection::features::ElementFeatures;
use crate::detection::models::FieldCategory;
use crate::detection::registry::{FieldRegistry, FieldTypeRule};
use crate::errors::ConfigError;

static PHONE_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)phone|tel|mobile|电话|手机").expect("Invalid regex"));
static RESUME_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)resume|cv|简历").expect("Invalid regex"));
static REQUIRED_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)required|必填|\*|必须").expect("Invalid regex"));
static IDENTITY_DATA_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)name|email|phone|address").expect("Invalid regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub identifier_bonus: u32,
    pub placeholder_bonus: u32,
    pub aria_label_bonus: u32,
    pub pattern_bonus: u32,
    pub kind_bonus: u32,
    pub email_type_bonus: u32,
    pub phone_bonus: u32,
    pub resume_file_bonus: u32,
    pub required_bonus: u32,
    pub data_attribute_bonus: u32,
    pub form_context_bonus: u32,
    pub site_override_bonus: u32,
    /// A best score must be strictly greater than this to be reported.
    pub min_score: u32,
    pub confidence_normalizer: f64,
    /// Summary threshold for "high confidence" fields.
    pub high_confidence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            identifier_bonus: 5,
            placeholder_bonus: 3,
            aria_label_bonus: 3,
            pattern_bonus: 2,
            kind_bonus: 3,
            email_type_bonus: 8,
            phone_bonus: 6,
            resume_file_bonus: 7,
            required_bonus: 2,
            data_attribute_bonus: 3,
            form_context_bonus: 2,
            site_override_bonus: 5,
            min_score: 5,
            confidence_normalizer: 15.0,
            high_confidence: 0.8,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.confidence_normalizer.is_finite() || self.confidence_normalizer <= 0.0 {
            return Err(ConfigError::InvalidWeights(format!(
                "confidence_normalizer must be a positive number, got {}",
                self.confidence_normalizer
            )));
        }
        if !(0.0..=1.0).contains(&self.high_confidence) {
            return Err(ConfigError::InvalidWeights(format!(
                "high_confidence must be within [0, 1], got {}",
                self.high_confidence
            )));
        }
        Ok(())
    }

    /// `min(score / normalizer, 1.0)`.
    pub fn confidence(&self, score: u32) -> f64 {
        (f64::from(score) / self.confidence_normalizer).min(1.0)
    }
}

/// Score of one rule for one element, with the trace of what contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub score: u32,
    pub reasons: Vec<String>,
}

impl RuleScore {
    fn add(&mut self, points: u32, reason: impl Into<String>) {
        if points == 0 {
            return;
        }
        self.score = self.score.saturating_add(points);
        self.reasons.push(format!("{} (+{points})", reason.into()));
    }
}

/// Winning rule for an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub field_type: String,
    pub score: u32,
    pub confidence: f64,
    pub category: FieldCategory,
    pub match_reason: String,
}

/// Per-element text, computed once and reused for every rule.
pub struct SignalText<'f> {
    features: &'f ElementFeatures,
    text: String,
    data_text: String,
    form_text: Option<String>,
}

impl<'f> SignalText<'f> {
    pub fn new(features: &'f ElementFeatures) -> Self {
        Self {
            features,
            text: features.analysis_text(),
            data_text: features.data_attribute_text(),
            form_text: features.form_context.as_ref().map(|f| f.text()),
        }
    }
}

pub fn score_rule(
    rule: &FieldTypeRule,
    signals: &SignalText<'_>,
    site_hits: u32,
    weights: &ScoringWeights,
) -> RuleScore {
    let f = signals.features;
    let text = signals.text.as_str();
    let mut result = RuleScore {
        score: 0,
        reasons: Vec::new(),
    };

    for keyword in &rule.keywords {
        if !keyword.is_match(text) {
            continue;
        }
        let kw = &keyword.source;
        result.add(rule.base_priority, format!("keyword '{kw}'"));
        if keyword.is_match(&f.identifier) || keyword.is_match(&f.name) {
            result.add(weights.identifier_bonus, format!("keyword '{kw}' in id/name"));
        }
        if keyword.is_match(&f.placeholder) {
            result.add(weights.placeholder_bonus, format!("keyword '{kw}' in placeholder"));
        }
        if keyword.is_match(&f.aria_label) {
            result.add(weights.aria_label_bonus, format!("keyword '{kw}' in aria-label"));
        }
    }

    for pattern in &rule.patterns {
        if pattern.is_match(text) {
            result.add(
                rule.base_priority.saturating_add(weights.pattern_bonus),
                format!("pattern /{}/", pattern.as_str()),
            );
        }
    }

    if rule.accepts_kind(&f.input_type) || rule.accepts_kind(&f.element_kind) {
        result.add(weights.kind_bonus, format!("kind '{}'", f.input_type));
    }

    if f.input_type == "email"
        && (text.contains("email") || text.contains("邮箱"))
        && rule.accepts_kind("email")
    {
        result.add(weights.email_type_bonus, "email input");
    }

    if (f.input_type == "tel" || PHONE_SIGNAL.is_match(text))
        && rule.in_category(FieldCategory::Personal)
    {
        result.add(weights.phone_bonus, "phone signal");
    }

    if f.input_type == "file" && RESUME_SIGNAL.is_match(text) && rule.accepts_kind("file") {
        result.add(weights.resume_file_bonus, "resume upload");
    }

    if f.required || REQUIRED_SIGNAL.is_match(text) {
        result.add(weights.required_bonus, "required");
    }

    if IDENTITY_DATA_SIGNAL.is_match(&signals.data_text) {
        result.add(weights.data_attribute_bonus, "identity data attribute");
    }

    if let Some(form_text) = &signals.form_text {
        let relevant = rule.categories.iter().any(|c| {
            c.form_context_keywords()
                .iter()
                .any(|kw| form_text.contains(kw))
        });
        if relevant {
            result.add(weights.form_context_bonus, "form context");
        }
    }

    if site_hits > 0 {
        result.add(
            weights.site_override_bonus.saturating_mul(site_hits),
            format!("site override x{site_hits}"),
        );
    }

    result
}

/// Scores for every rule, in registry declaration order.
pub fn score_all(
    registry: &FieldRegistry,
    features: &ElementFeatures,
    site_hits: &HashMap<&str, u32>,
    weights: &ScoringWeights,
) -> Vec<RuleScore> {
    let signals = SignalText::new(features);
    registry
        .rules()
        .iter()
        .map(|rule| {
            let hits = site_hits.get(rule.field_type.as_str()).copied().unwrap_or(0);
            score_rule(rule, &signals, hits, weights)
        })
        .collect()
}

/// Best rule above threshold, or `None` when nothing clears `min_score`.
pub fn classify(
    registry: &FieldRegistry,
    features: &ElementFeatures,
    site_hits: &HashMap<&str, u32>,
    weights: &ScoringWeights,
) -> Option<Classification> {
    let scores = score_all(registry, features, site_hits, weights);

    let mut best: Option<(&FieldTypeRule, RuleScore)> = None;
    for (rule, score) in registry.rules().iter().zip(scores) {
        let better = match &best {
            Some((_, current)) => score.score > current.score,
            None => true,
        };
        if better {
            best = Some((rule, score));
        }
    }

    let (rule, score) = best?;
    if score.score <= weights.min_score {
        return None;
    }

    Some(Classification {
        field_type: rule.field_type.clone(),
        score: score.score,
        confidence: weights.confidence(score.score),
        category: rule.primary_category(),
        match_reason: score.reasons.join(", "),
    })
}
