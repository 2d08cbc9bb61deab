use estimator_features::FeatureError;
use estimator_history::HistoryError;
use estimator_predictor::PredictorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Feature error: {0}")]
    FeatureError(#[from] FeatureError),

    #[error("History error: {0}")]
    HistoryError(#[from] HistoryError),

    #[error("Predictor error: {0}")]
    PredictorError(#[from] PredictorError),

    #[error("Invariant violation (model {model_version}): {detail}")]
    InvariantViolation {
        model_version: String,
        detail: String,
    },

    #[error("Invalid risk mapping artifact: {0}")]
    InvalidMapping(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl EngineError {
    /// Malformed/missing input, rejected before any model call.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::FeatureError(
                FeatureError::MissingField { .. } | FeatureError::NonPositiveSize { .. }
            )
        )
    }

    /// Upstream text encoder timed out or failed; the caller may retry once.
    pub fn is_embedding_unavailable(&self) -> bool {
        matches!(self, Self::FeatureError(e) if e.is_embedding_unavailable())
    }

    /// Model artifact missing or corrupt; fatal for the call.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            Self::PredictorError(PredictorError::ModelUnavailable { .. })
        )
    }
}
