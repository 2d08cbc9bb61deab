use crate::error::{FeatureError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Default budget for one embedding round-trip before the call surfaces
/// `EmbeddingTimeout` instead of hanging.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// Seam to the external text-embedding service.
///
/// The encoder itself is a black box; the engine only depends on a
/// fixed-length float vector per scope description. Tests and the degraded
/// text-free mode plug in local implementations.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Length of every vector this client produces.
    fn dimension(&self) -> usize;

    /// Embed one scope description. May fail with availability errors.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Run one embedding request under a timeout, checking the dimension
/// contract on the way out.
pub async fn embed_with_timeout(
    client: &dyn EmbeddingClient,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    let vector = tokio::time::timeout(timeout, client.embed(text))
        .await
        .map_err(|_| FeatureError::EmbeddingTimeout {
            timeout_ms: timeout.as_millis() as u64,
        })??;

    if vector.len() != client.dimension() {
        return Err(FeatureError::InvalidDimension {
            expected: client.dimension(),
            actual: vector.len(),
        });
    }
    Ok(vector)
}

/// Deterministic local embedder: hashes word tokens into buckets and
/// L2-normalizes. Good enough for tests and offline smoke runs; projects
/// with overlapping scope wording land near each other.
pub struct StubEmbedding {
    dimension: usize,
}

impl StubEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingClient for StubEmbedding {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            // FNV-1a over the lowercased token.
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
