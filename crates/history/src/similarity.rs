use crate::error::{HistoryError, Result};
use crate::snapshot::{HistoricalProject, IndexSnapshot};
use estimator_protocol::SimilarProject;
use std::cmp::Ordering;

/// Default similarity floor: no floor, every match qualifies.
pub const DEFAULT_SIMILARITY_FLOOR: f32 = 0.0;

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A comparable with its similarity score, still borrowing the snapshot so
/// downstream aggregation can reach deliverable outcomes.
#[derive(Debug, Clone)]
pub struct ScoredProject<'a> {
    pub project: &'a HistoricalProject,
    /// Cosine similarity clamped into [0, 1].
    pub score: f32,
}

impl ScoredProject<'_> {
    pub fn to_similar_project(&self) -> SimilarProject {
        SimilarProject {
            name: self.project.name.clone(),
            year: self.project.completion_year,
            actual_cost: self.project.actual_cost,
            actual_duration: self.project.actual_duration,
            similarity_score: self.score,
        }
    }
}

/// Brute-force nearest-neighbor search over one index snapshot.
///
/// O(n) per query is fine at historical-project scale; what matters is the
/// ordering contract: descending similarity, ties broken by more recent
/// completion year, scores clamped into [0, 1].
pub struct SimilarityIndex<'a> {
    snapshot: &'a IndexSnapshot,
    floor: f32,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(snapshot: &'a IndexSnapshot) -> Self {
        Self {
            snapshot,
            floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    /// Top-k comparables for a query embedding, with snapshot references.
    /// Returns fewer than `top_k` entries when the index is smaller; never
    /// pads.
    pub fn query_scored(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredProject<'a>>> {
        self.query_excluding(embedding, top_k, None)
    }

    /// Top-k comparables in the wire shape.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SimilarProject>> {
        Ok(self
            .query_scored(embedding, top_k)?
            .iter()
            .map(ScoredProject::to_similar_project)
            .collect())
    }

    /// Comparables for an already-indexed project, by its stored embedding.
    /// The project itself is excluded from its own comparables.
    pub fn query_by_id(&self, project_id: &str, top_k: usize) -> Result<Vec<SimilarProject>> {
        let project = self
            .snapshot
            .get(project_id)
            .ok_or_else(|| HistoryError::NotFound(project_id.to_string()))?;
        Ok(self
            .query_excluding(&project.embedding, top_k, Some(project_id))?
            .iter()
            .map(ScoredProject::to_similar_project)
            .collect())
    }

    fn query_excluding(
        &self,
        embedding: &[f32],
        top_k: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ScoredProject<'a>>> {
        if top_k == 0 {
            return Err(HistoryError::InvalidTopK);
        }
        if embedding.len() != self.snapshot.dimension() {
            return Err(HistoryError::InvalidDimension {
                expected: self.snapshot.dimension(),
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<ScoredProject<'a>> = self
            .snapshot
            .projects()
            .iter()
            .filter(|p| exclude_id != Some(p.project_id.as_str()))
            .map(|p| ScoredProject {
                project: p,
                score: cosine_similarity(embedding, &p.embedding).clamp(0.0, 1.0),
            })
            .filter(|s| s.score >= self.floor)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.project.completion_year.cmp(&a.project.completion_year))
        });
        scored.truncate(top_k);

        log::debug!(
            "Similarity query: {} candidates, floor {}, returning {}",
            self.snapshot.len(),
            self.floor,
            scored.len()
        );
        Ok(scored)
    }
}
