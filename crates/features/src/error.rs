use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Schema error: missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Schema error: estimated_size.value must be positive, got {value}")]
    NonPositiveSize { value: f64 },

    #[error("Embedding service unavailable: timed out after {timeout_ms} ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid vocabulary artifact: {0}")]
    InvalidVocabulary(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl FeatureError {
    /// True for the failures callers may retry once at their discretion.
    pub fn is_embedding_unavailable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingTimeout { .. } | Self::EmbeddingUnavailable(_)
        )
    }
}
