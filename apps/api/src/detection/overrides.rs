//! Site Override Table: per-domain CSS selectors for known recruiting platforms.
//!
//! A platform is a row of data: the domains it lives on and, per field type, the
//! selectors its markup uses. The built-in rows ship in `data/site_overrides.json`;
//! `SITE_OVERRIDES_PATH` replaces them at start-up with a file of the same shape.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::detection::registry::FieldRegistry;
use crate::errors::ConfigError;

const BUILTIN_OVERRIDES: &str = include_str!("../../data/site_overrides.json");

/// One platform as written in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteOverrideSpec {
    pub name: String,
    pub domains: Vec<String>,
    /// field type -> selectors, in match order.
    pub fields: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct FieldSelectors {
    pub field_type: String,
    sources: Vec<String>,
    selectors: Vec<Selector>,
}

impl FieldSelectors {
    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        self.selectors.iter().any(|s| s.matches(element))
    }
}

#[derive(Debug, Clone)]
pub struct SiteOverrideRule {
    pub name: String,
    /// Lower-cased hostname substrings.
    pub domains: Vec<String>,
    pub fields: Vec<FieldSelectors>,
}

impl SiteOverrideRule {
    pub fn matches_host(&self, hostname: &str) -> bool {
        let host = hostname.trim().to_ascii_lowercase();
        !host.is_empty() && self.domains.iter().any(|d| host.contains(d.as_str()))
    }

    pub fn spec(&self) -> SiteOverrideSpec {
        SiteOverrideSpec {
            name: self.name.clone(),
            domains: self.domains.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| (f.field_type.clone(), f.sources.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteOverrideTable {
    rules: Vec<SiteOverrideRule>,
}

impl SiteOverrideTable {
    pub fn builtin(registry: &FieldRegistry) -> Result<Self, ConfigError> {
        let specs: Vec<SiteOverrideSpec> =
            serde_json::from_str(BUILTIN_OVERRIDES).map_err(|source| ConfigError::Json {
                path: "data/site_overrides.json".to_string(),
                source,
            })?;
        Self::from_specs(specs, registry)
    }

    /// Reads a JSON array of `SiteOverrideSpec` from disk.
    pub fn load(path: &Path, registry: &FieldRegistry) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let specs: Vec<SiteOverrideSpec> = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Json { path: display, source })?;
        Self::from_specs(specs, registry)
    }

    pub fn from_specs(
        specs: Vec<SiteOverrideSpec>,
        registry: &FieldRegistry,
    ) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(specs.len());

        for spec in specs {
            let domains: Vec<String> = spec
                .domains
                .iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            if domains.is_empty() {
                return Err(ConfigError::NoDomains(spec.name));
            }

            let mut fields = Vec::with_capacity(spec.fields.len());
            for (field_type, sources) in spec.fields {
                if !registry.contains(&field_type) {
                    return Err(ConfigError::UnknownFieldType {
                        site: spec.name.clone(),
                        field_type,
                    });
                }
                let selectors = sources
                    .iter()
                    .map(|src| {
                        Selector::parse(src).map_err(|e| ConfigError::InvalidSelector {
                            site: spec.name.clone(),
                            field_type: field_type.clone(),
                            selector: src.clone(),
                            reason: format!("{e:?}"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push(FieldSelectors {
                    field_type,
                    sources,
                    selectors,
                });
            }

            rules.push(SiteOverrideRule {
                name: spec.name,
                domains,
                fields,
            });
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[SiteOverrideRule] {
        &self.rules
    }

    /// Rules whose domains match `hostname`, in table order.
    pub fn active_for(&self, hostname: &str) -> Vec<&SiteOverrideRule> {
        self.rules.iter().filter(|r| r.matches_host(hostname)).collect()
    }
}

/// Field type -> number of active site rules with a selector matching `element`.
pub fn override_hits<'a>(
    active: &[&'a SiteOverrideRule],
    element: &ElementRef<'_>,
) -> HashMap<&'a str, u32> {
    let mut hits = HashMap::new();
    for &rule in active {
        for field in &rule.fields {
            if field.matches(element) {
                *hits.entry(field.field_type.as_str()).or_insert(0) += 1;
            }
        }
    }
    hits
}
