use crate::error::{PredictorError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_V1: &str = include_str!("../../../artifacts/model-v1.json");

pub const MODEL_ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// One trained quantile regressor: a sparse linear head over the feature
/// schema. Weights are keyed by feature name; absent features contribute 0.
#[derive(Debug, Clone, Deserialize)]
pub struct QuantileHead {
    pub level: u8,
    pub intercept: f64,
    pub weights: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    schema_version: u32,
    model_version: String,
    vocabulary_version: String,
    cost_heads: Vec<QuantileHead>,
    duration_heads: Vec<QuantileHead>,
}

/// A loaded model artifact: independently trained p50/p80/p90 heads for cost
/// and duration, tied to the vocabulary version they were trained against.
#[derive(Debug)]
pub struct ModelArtifact {
    model_version: String,
    vocabulary_version: String,
    cost_heads: [QuantileHead; 3],
    duration_heads: [QuantileHead; 3],
}

impl ModelArtifact {
    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawArtifact = serde_json::from_str(data)?;
        if raw.schema_version != MODEL_ARTIFACT_SCHEMA_VERSION {
            return Err(PredictorError::InvalidArtifact(format!(
                "schema_version {} is not supported (expected {})",
                raw.schema_version, MODEL_ARTIFACT_SCHEMA_VERSION
            )));
        }
        let cost_heads = Self::ordered_heads(raw.cost_heads, "cost")?;
        let duration_heads = Self::ordered_heads(raw.duration_heads, "duration")?;
        Ok(Self {
            model_version: raw.model_version,
            vocabulary_version: raw.vocabulary_version,
            cost_heads,
            duration_heads,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(&path)?;
        let artifact = Self::from_json(&data)?;
        log::info!(
            "Loaded model artifact {} from {:?}",
            artifact.model_version,
            path.as_ref()
        );
        Ok(artifact)
    }

    /// Exactly one head per quantile level, returned in [p50, p80, p90]
    /// order regardless of artifact order.
    fn ordered_heads(heads: Vec<QuantileHead>, target: &str) -> Result<[QuantileHead; 3]> {
        let mut by_level: HashMap<u8, QuantileHead> = HashMap::new();
        for head in heads {
            if by_level.insert(head.level, head).is_some() {
                return Err(PredictorError::InvalidArtifact(format!(
                    "duplicate {target} head for a quantile level"
                )));
            }
        }
        let mut pick = |level: u8| {
            by_level.remove(&level).ok_or_else(|| {
                PredictorError::InvalidArtifact(format!("missing {target} head for p{level}"))
            })
        };
        Ok([pick(50)?, pick(80)?, pick(90)?])
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn vocabulary_version(&self) -> &str {
        &self.vocabulary_version
    }

    /// Heads in [p50, p80, p90] order.
    pub fn cost_heads(&self) -> &[QuantileHead; 3] {
        &self.cost_heads
    }

    pub fn duration_heads(&self) -> &[QuantileHead; 3] {
        &self.duration_heads
    }
}

/// Versioned artifact store. Holds every loadable model version; `latest`
/// resolves to the lexicographically greatest version id, which the release
/// process guarantees sorts chronologically.
pub struct ModelRegistry {
    artifacts: HashMap<String, Arc<ModelArtifact>>,
}

impl ModelRegistry {
    /// Registry seeded with the artifact compiled into the binary.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self {
            artifacts: HashMap::new(),
        };
        registry.insert(ModelArtifact::from_json(BUILTIN_V1)?);
        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            artifacts: HashMap::new(),
        }
    }

    pub fn insert(&mut self, artifact: ModelArtifact) {
        self.artifacts
            .insert(artifact.model_version.clone(), Arc::new(artifact));
    }

    pub fn register_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.insert(ModelArtifact::load(path)?);
        Ok(())
    }

    pub fn available_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.artifacts.keys().cloned().collect();
        versions.sort();
        versions
    }

    pub fn latest_version(&self) -> Option<String> {
        self.artifacts.keys().max().cloned()
    }

    /// Resolve a requested version, or `latest` when `None`. Absence is
    /// fatal for the calling prediction.
    pub fn get(&self, version: Option<&str>) -> Result<Arc<ModelArtifact>> {
        match version {
            Some(v) => self.artifacts.get(v).cloned().ok_or_else(|| {
                PredictorError::ModelUnavailable {
                    version: v.to_string(),
                    reason: format!(
                        "not registered (available: {})",
                        self.available_versions().join(", ")
                    ),
                }
            }),
            None => {
                let latest =
                    self.latest_version()
                        .ok_or_else(|| PredictorError::ModelUnavailable {
                            version: "latest".to_string(),
                            reason: "registry is empty".to_string(),
                        })?;
                Ok(Arc::clone(&self.artifacts[&latest]))
            }
        }
    }
}
