use crate::artifact::{ModelArtifact, QuantileHead};
use crate::error::{PredictorError, Result};
use estimator_features::FeatureVector;
use std::sync::Arc;

/// Calibrated cost quantiles, monotonic by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBand {
    pub p50: f64,
    pub p80: f64,
    pub p90: f64,
}

/// Calibrated duration quantiles in canonical time units, rounded half-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationBand {
    pub p50: i64,
    pub p80: i64,
    pub p90: i64,
}

/// Marginal contribution of one feature to the p80 cost quantile, in schema
/// declaration order. Risk attribution groups these into named categories.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAttribution {
    pub feature: String,
    pub contribution: f64,
}

#[derive(Debug, Clone)]
pub struct PredictorOutput {
    pub model_version: String,
    pub cost: CostBand,
    pub duration: DurationBand,
    pub attributions: Vec<FeatureAttribution>,
}

/// Evaluates the three per-quantile regressors of one model artifact and
/// enforces quantile monotonicity as a post-processing step.
pub struct QuantilePredictor {
    artifact: Arc<ModelArtifact>,
}

impl QuantilePredictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn model_version(&self) -> &str {
        self.artifact.model_version()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<PredictorOutput> {
        if features.vocabulary_version() != self.artifact.vocabulary_version() {
            return Err(PredictorError::VocabularyMismatch {
                model_version: self.artifact.model_version().to_string(),
                expected: self.artifact.vocabulary_version().to_string(),
                actual: features.vocabulary_version().to_string(),
            });
        }

        let cost_raw = self
            .artifact
            .cost_heads()
            .each_ref()
            .map(|head| evaluate_head(head, features));
        let duration_raw = self
            .artifact
            .duration_heads()
            .each_ref()
            .map(|head| evaluate_head(head, features));

        let [cost_p50, cost_p80, cost_p90] = clip_monotonic(cost_raw);
        let [dur_p50, dur_p80, dur_p90] = clip_monotonic(duration_raw);

        log::debug!(
            "Quantile prediction ({}): cost p50={:.0} p80={:.0} p90={:.0}",
            self.artifact.model_version(),
            cost_p50,
            cost_p80,
            cost_p90
        );

        Ok(PredictorOutput {
            model_version: self.artifact.model_version().to_string(),
            cost: CostBand {
                p50: cost_p50,
                p80: cost_p80,
                p90: cost_p90,
            },
            duration: DurationBand {
                p50: round_half_up(dur_p50),
                p80: round_half_up(dur_p80),
                p90: round_half_up(dur_p90),
            },
            attributions: self.attribute(features),
        })
    }

    /// Per-feature marginal contributions to the p80 cost head, in feature
    /// schema declaration order. Deterministic for identical inputs.
    fn attribute(&self, features: &FeatureVector) -> Vec<FeatureAttribution> {
        let p80 = &self.artifact.cost_heads()[1];
        features
            .names()
            .iter()
            .zip(features.values())
            .map(|(name, value)| FeatureAttribution {
                feature: name.clone(),
                contribution: p80.weights.get(name).copied().unwrap_or(0.0) * value,
            })
            .collect()
    }
}

fn evaluate_head(head: &QuantileHead, features: &FeatureVector) -> f64 {
    let weighted: f64 = features
        .names()
        .iter()
        .zip(features.values())
        .map(|(name, value)| head.weights.get(name).copied().unwrap_or(0.0) * value)
        .sum();
    head.intercept + weighted
}

/// Raise-up clipping: a higher quantile is lifted to the lower one when the
/// raw outputs cross, never the other way, so the floor estimate is never
/// understated. Negative raw outputs clamp to zero first.
fn clip_monotonic(raw: [f64; 3]) -> [f64; 3] {
    let p50 = raw[0].max(0.0);
    let p80 = raw[1].max(p50);
    let p90 = raw[2].max(p80);
    [p50, p80, p90]
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
