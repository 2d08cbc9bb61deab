use crate::error::{EngineError, Result};
use estimator_predictor::FeatureAttribution;
use estimator_protocol::RiskFactor;
use serde::Deserialize;
use std::path::Path;

const BUILTIN_V1: &str = include_str!("../../../artifacts/risk-categories-v1.json");

pub const RISK_MAPPING_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    name: String,
    impact: String,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    schema_version: u32,
    mapping_version: String,
    categories: Vec<RawCategory>,
}

/// Versioned mapping from raw feature names to human-readable risk
/// categories. Declaration order doubles as the tie-break order for equal
/// severities.
#[derive(Debug, Clone)]
pub struct RiskMapping {
    version: String,
    categories: Vec<RawCategory>,
}

impl RiskMapping {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_V1)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawMapping = serde_json::from_str(data)?;
        if raw.schema_version != RISK_MAPPING_SCHEMA_VERSION {
            return Err(EngineError::InvalidMapping(format!(
                "schema_version {} is not supported (expected {})",
                raw.schema_version, RISK_MAPPING_SCHEMA_VERSION
            )));
        }
        if raw.categories.is_empty() {
            return Err(EngineError::InvalidMapping(
                "mapping must declare at least one category".to_string(),
            ));
        }
        Ok(Self {
            version: raw.mapping_version,
            categories: raw.categories,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Exact feature names win over prefixes, so unseen buckets can route to
    /// a data-quality category even though a prefix rule also covers them.
    fn category_for(&self, feature: &str) -> Option<usize> {
        if let Some(idx) = self
            .categories
            .iter()
            .position(|c| c.features.iter().any(|f| f == feature))
        {
            return Some(idx);
        }
        self.categories
            .iter()
            .position(|c| c.prefixes.iter().any(|p| feature.starts_with(p.as_str())))
    }

    /// Group per-feature contributions into ranked risk factors.
    ///
    /// Severity is each category's share of the total positive contribution,
    /// so severities sum to at most 1. Negative contributions reduce risk
    /// and are ignored. Deterministic: stable sort, declaration-order ties.
    pub fn attribute(&self, attributions: &[FeatureAttribution], top_n: usize) -> Vec<RiskFactor> {
        let mut totals = vec![0.0f64; self.categories.len()];
        for attribution in attributions {
            if attribution.contribution <= 0.0 {
                continue;
            }
            match self.category_for(&attribution.feature) {
                Some(idx) => totals[idx] += attribution.contribution,
                None => log::debug!(
                    "Feature '{}' has no risk category in mapping {}",
                    attribution.feature,
                    self.version
                ),
            }
        }

        let total_positive: f64 = totals.iter().sum();
        if total_positive <= 0.0 {
            return Vec::new();
        }

        let mut factors: Vec<RiskFactor> = self
            .categories
            .iter()
            .zip(&totals)
            .filter(|(_, total)| **total > 0.0)
            .map(|(category, total)| RiskFactor {
                name: category.name.clone(),
                impact: category.impact.clone(),
                severity: ((total / total_positive) as f32).clamp(0.0, 1.0),
            })
            .collect();

        // Stable sort keeps declaration order for equal severities.
        factors.sort_by(|a, b| {
            b.severity
                .partial_cmp(&a.severity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        factors.truncate(top_n);
        factors
    }
}
