use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictorError>;

#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("Model artifact unavailable for version '{version}': {reason}")]
    ModelUnavailable { version: String, reason: String },

    #[error(
        "Feature vocabulary mismatch: model '{model_version}' was trained \
         against vocabulary '{expected}', feature vector uses '{actual}'"
    )]
    VocabularyMismatch {
        model_version: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
