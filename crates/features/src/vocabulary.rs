use crate::error::{FeatureError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_V1: &str = include_str!("../../../artifacts/vocabulary-v1.json");

pub const VOCABULARY_SCHEMA_VERSION: u32 = 1;

/// Bucket name used when a categorical value is not in the vocabulary.
/// Novel inputs land here instead of failing the prediction.
pub const UNSEEN_BUCKET: &str = "__unseen__";

#[derive(Debug, Deserialize)]
struct RawVocabulary {
    schema_version: u32,
    vocabulary_version: String,
    canonical_size_unit: String,
    size_unit_factors: HashMap<String, f64>,
    project_types: Vec<String>,
    contract_types: Vec<String>,
    countries: Vec<String>,
}

/// Versioned categorical vocabulary plus the canonical-unit table.
///
/// The feature schema (names and order) is a pure function of this table, so
/// a predictor trained against vocabulary `v1` stays aligned with vectors
/// built from `v1`. New categories ship as a new artifact, never as code.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    version: String,
    canonical_size_unit: String,
    size_unit_factors: HashMap<String, f64>,
    project_types: Vec<String>,
    contract_types: Vec<String>,
    countries: Vec<String>,
    feature_names: Vec<String>,
}

impl Vocabulary {
    /// Vocabulary compiled into the binary; matches the builtin model
    /// artifact.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_V1)
    }

    /// Load a vocabulary artifact override from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawVocabulary = serde_json::from_str(data)?;
        if raw.schema_version != VOCABULARY_SCHEMA_VERSION {
            return Err(FeatureError::InvalidVocabulary(format!(
                "schema_version {} is not supported (expected {})",
                raw.schema_version, VOCABULARY_SCHEMA_VERSION
            )));
        }
        if raw.project_types.is_empty() || raw.contract_types.is_empty() {
            return Err(FeatureError::InvalidVocabulary(
                "project_types and contract_types must be non-empty".to_string(),
            ));
        }

        let feature_names = Self::build_feature_names(&raw);
        Ok(Self {
            version: raw.vocabulary_version,
            canonical_size_unit: raw.canonical_size_unit,
            size_unit_factors: raw.size_unit_factors,
            project_types: raw.project_types,
            contract_types: raw.contract_types,
            countries: raw.countries,
            feature_names,
        })
    }

    /// Fixed feature schema: numeric features first, then one-hot groups in
    /// declaration order, each group ending with its unseen bucket.
    fn build_feature_names(raw: &RawVocabulary) -> Vec<String> {
        let mut names = vec![
            "size_canonical".to_string(),
            "deliverable_count".to_string(),
        ];
        for group in [
            ("project_type", &raw.project_types),
            ("contract_type", &raw.contract_types),
            ("country", &raw.countries),
        ] {
            for value in group.1 {
                names.push(format!("{}={}", group.0, value));
            }
            names.push(format!("{}={}", group.0, UNSEEN_BUCKET));
        }
        names
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn canonical_size_unit(&self) -> &str {
        &self.canonical_size_unit
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Convert a size value into the canonical unit. Unknown units pass
    /// through at factor 1.0 and are reported as a data-quality signal.
    pub fn canonicalize_size(&self, value: f64, unit: &str) -> (f64, bool) {
        match self.size_unit_factors.get(unit) {
            Some(factor) => (value * factor, true),
            None => {
                log::warn!(
                    "Unknown size unit '{}' (vocabulary {}), using value as-is",
                    unit,
                    self.version
                );
                (value, false)
            }
        }
    }

    pub fn project_types(&self) -> &[String] {
        &self.project_types
    }

    pub fn contract_types(&self) -> &[String] {
        &self.contract_types
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Resolve a categorical value to its known index, or None for the
    /// unseen bucket.
    pub fn categorical_index(values: &[String], value: &str) -> Option<usize> {
        values.iter().position(|v| v == value)
    }
}
