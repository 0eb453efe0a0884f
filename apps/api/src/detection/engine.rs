use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::detection::labels::LabelBounds;
use crate::detection::overrides::SiteOverrideTable;
use crate::detection::registry::FieldRegistry;
use crate::detection::scoring::ScoringWeights;
use crate::errors::ConfigError;

/// Everything a scan reads and nothing it writes: registry, override table and
/// tuning. Built once at start-up and shared behind an `Arc`.
#[derive(Debug)]
pub struct DetectionEngine {
    registry: FieldRegistry,
    overrides: SiteOverrideTable,
    weights: ScoringWeights,
    label_bounds: LabelBounds,
}

/// Shape of the `SCORING_WEIGHTS_PATH` file: scoring weights at the top level,
/// label bounds under `labels`. Any key may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct TuningFile {
    #[serde(flatten)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub labels: LabelBounds,
}

impl TuningFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json { path: display, source })
    }
}

impl DetectionEngine {
    pub fn new(
        registry: FieldRegistry,
        overrides: SiteOverrideTable,
        weights: ScoringWeights,
        label_bounds: LabelBounds,
    ) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self {
            registry,
            overrides,
            weights,
            label_bounds,
        })
    }

    /// Built-in registry, optional override table file (built-in table otherwise),
    /// optional tuning file (defaults otherwise).
    pub fn load(
        overrides_path: Option<&Path>,
        tuning_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let registry = FieldRegistry::builtin()?;

        let overrides = match overrides_path {
            Some(path) => SiteOverrideTable::load(path, &registry)?,
            None => SiteOverrideTable::builtin(&registry)?,
        };

        let tuning = match tuning_path {
            Some(path) => TuningFile::load(path)?,
            None => TuningFile::default(),
        };

        info!(
            field_types = registry.len(),
            site_overrides = overrides.rules().len(),
            custom_overrides = overrides_path.is_some(),
            custom_tuning = tuning_path.is_some(),
            "Detection engine initialized"
        );

        Self::new(registry, overrides, tuning.weights, tuning.labels)
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn overrides(&self) -> &SiteOverrideTable {
        &self.overrides
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn label_bounds(&self) -> &LabelBounds {
        &self.label_bounds
    }
}
