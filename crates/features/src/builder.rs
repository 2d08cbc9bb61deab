use crate::embedding::{embed_with_timeout, EmbeddingClient, DEFAULT_EMBED_TIMEOUT};
use crate::error::{FeatureError, Result};
use crate::types::FeatureVector;
use crate::vocabulary::{Vocabulary, UNSEEN_BUCKET};
use estimator_protocol::CanonicalProjectRecord;
use std::sync::Arc;
use std::time::Duration;

/// Maps a canonical project record into a fixed-schema feature vector plus
/// its semantic embedding.
pub struct FeatureVectorBuilder {
    vocabulary: Arc<Vocabulary>,
    client: Arc<dyn EmbeddingClient>,
    embed_timeout: Duration,
    names: Arc<[String]>,
}

impl FeatureVectorBuilder {
    pub fn new(vocabulary: Arc<Vocabulary>, client: Arc<dyn EmbeddingClient>) -> Self {
        let names: Arc<[String]> = vocabulary.feature_names().to_vec().into();
        Self {
            vocabulary,
            client,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            names,
        }
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn embedding_dimension(&self) -> usize {
        self.client.dimension()
    }

    /// Build the full feature vector, including the semantic embedding of
    /// the scope description. Rejects the record before any model call if
    /// required fields are missing or the size is non-positive.
    pub async fn build(&self, record: &CanonicalProjectRecord) -> Result<FeatureVector> {
        let values = self.encode(record)?;
        let embedding =
            embed_with_timeout(self.client.as_ref(), &record.description, self.embed_timeout)
                .await?;
        Ok(FeatureVector::new(
            self.vocabulary.version().to_string(),
            Arc::clone(&self.names),
            values,
            embedding,
            false,
        ))
    }

    /// Degraded text-free build: tabular features only, zero embedding.
    /// Explicit opt-in for callers after an embedding-unavailable failure;
    /// similarity search over a zero vector returns nothing useful, and the
    /// confidence scorer sees that.
    pub fn build_text_free(&self, record: &CanonicalProjectRecord) -> Result<FeatureVector> {
        let values = self.encode(record)?;
        log::warn!(
            "Building text-free feature vector for '{}' (no embedding)",
            record.name
        );
        Ok(FeatureVector::new(
            self.vocabulary.version().to_string(),
            Arc::clone(&self.names),
            values,
            vec![0.0; self.client.dimension()],
            true,
        ))
    }

    fn encode(&self, record: &CanonicalProjectRecord) -> Result<Vec<f64>> {
        let size = Self::required_size(record)?;
        if record.project_type.is_empty() {
            return Err(FeatureError::MissingField {
                field: "project_type",
            });
        }
        if record.contract_type.is_empty() {
            return Err(FeatureError::MissingField {
                field: "contract_type",
            });
        }

        let (canonical_size, _known_unit) =
            self.vocabulary.canonicalize_size(size.value, &size.unit);

        let mut values = vec![canonical_size, record.deliverables.len() as f64];
        self.encode_one_hot(
            &mut values,
            "project_type",
            self.vocabulary.project_types(),
            &record.project_type,
        );
        self.encode_one_hot(
            &mut values,
            "contract_type",
            self.vocabulary.contract_types(),
            &record.contract_type,
        );
        self.encode_one_hot(
            &mut values,
            "country",
            self.vocabulary.countries(),
            &record.location.country,
        );

        debug_assert_eq!(values.len(), self.names.len());
        Ok(values)
    }

    fn required_size(
        record: &CanonicalProjectRecord,
    ) -> Result<&estimator_protocol::EstimatedSize> {
        let size = record.estimated_size.as_ref().ok_or(FeatureError::MissingField {
            field: "estimated_size",
        })?;
        if size.value <= 0.0 {
            return Err(FeatureError::NonPositiveSize { value: size.value });
        }
        Ok(size)
    }

    /// One-hot encode against the known values; unknown values light up the
    /// unseen bucket and are logged as a data-quality signal, not an error.
    fn encode_one_hot(&self, values: &mut Vec<f64>, group: &str, known: &[String], value: &str) {
        let index = Vocabulary::categorical_index(known, value);
        for i in 0..known.len() {
            values.push(if index == Some(i) { 1.0 } else { 0.0 });
        }
        match index {
            Some(_) => values.push(0.0),
            None => {
                log::warn!(
                    "Unknown {} '{}' mapped to {} bucket (vocabulary {})",
                    group,
                    value,
                    UNSEEN_BUCKET,
                    self.vocabulary.version()
                );
                values.push(1.0);
            }
        }
    }
}
