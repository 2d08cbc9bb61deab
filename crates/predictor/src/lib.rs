//! # Estimator Predictor
//!
//! Quantile Predictor: three independently trained quantile regressors per
//! target (cost, duration) sharing one feature schema, loaded from versioned
//! model artifacts. Monotonicity is enforced by raise-up clipping after
//! evaluation; per-feature attributions feed risk attribution downstream.

mod artifact;
mod error;
mod quantile;

pub use artifact::{ModelArtifact, ModelRegistry, QuantileHead, MODEL_ARTIFACT_SCHEMA_VERSION};
pub use error::{PredictorError, Result};
pub use quantile::{
    CostBand, DurationBand, FeatureAttribution, PredictorOutput, QuantilePredictor,
};
