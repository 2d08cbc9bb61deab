use std::sync::Arc;

/// Fixed-schema numeric features plus the semantic embedding for one record.
///
/// Owned by the prediction call that created it; never persisted. The name
/// slice is shared with the vocabulary that defined the schema.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    vocabulary_version: String,
    names: Arc<[String]>,
    values: Vec<f64>,
    embedding: Vec<f32>,
    text_free: bool,
}

impl FeatureVector {
    pub(crate) fn new(
        vocabulary_version: String,
        names: Arc<[String]>,
        values: Vec<f64>,
        embedding: Vec<f32>,
        text_free: bool,
    ) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            vocabulary_version,
            names,
            values,
            embedding,
            text_free,
        }
    }

    pub fn vocabulary_version(&self) -> &str {
        &self.vocabulary_version
    }

    /// Feature names in schema declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Values aligned with `names()`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// False only for vectors built text-free (degraded mode). An encoder
    /// that legitimately returns all zeros still counts as an embedding;
    /// degraded mode is an explicit choice, never inferred from the values.
    pub fn has_embedding(&self) -> bool {
        !self.text_free
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
