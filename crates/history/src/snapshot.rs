use crate::error::{HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const INDEX_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Estimated-vs-actual cost for one deliverable of a completed project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableOutcome {
    pub name: String,
    pub estimated_cost: f64,
    pub actual_cost: f64,
}

/// One completed project as recorded by the offline refresh job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalProject {
    pub project_id: String,
    pub name: String,
    pub completion_year: i32,
    pub embedding: Vec<f32>,
    pub actual_cost: f64,
    pub actual_duration: i64,
    #[serde(default)]
    pub deliverables: Vec<DeliverableOutcome>,
}

/// Operator-facing summary of a loaded snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub index_version: String,
    pub projects: usize,
    pub embedding_dimension: usize,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub deliverable_samples: usize,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    schema_version: u32,
    index_version: String,
    embedding_dimension: usize,
    projects: Vec<HistoricalProject>,
}

/// Immutable view of the historical project index.
///
/// A snapshot is built once (by the offline refresh job, or from its JSON
/// artifact here) and never mutated afterwards; concurrent readers share it
/// through an `Arc` handed out by [`IndexHandle`](crate::IndexHandle).
#[derive(Debug)]
pub struct IndexSnapshot {
    index_version: String,
    dimension: usize,
    projects: Vec<HistoricalProject>,
    by_id: HashMap<String, usize>,
}

impl IndexSnapshot {
    /// Snapshot with no history at all. Predictions against it degrade to
    /// empty comparables and low confidence, they do not fail.
    pub fn empty(index_version: impl Into<String>, dimension: usize) -> Self {
        Self {
            index_version: index_version.into(),
            dimension,
            projects: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn from_projects(
        index_version: impl Into<String>,
        dimension: usize,
        projects: Vec<HistoricalProject>,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(projects.len());
        for (idx, project) in projects.iter().enumerate() {
            if project.embedding.len() != dimension {
                return Err(HistoryError::InvalidDimension {
                    expected: dimension,
                    actual: project.embedding.len(),
                });
            }
            if by_id.insert(project.project_id.clone(), idx).is_some() {
                return Err(HistoryError::InvalidSnapshot(format!(
                    "duplicate project_id '{}'",
                    project.project_id
                )));
            }
        }
        Ok(Self {
            index_version: index_version.into(),
            dimension,
            projects,
            by_id,
        })
    }

    /// Load a snapshot artifact produced by the offline refresh job.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        log::info!("Loading index snapshot from {:?}", path.as_ref());
        let data = std::fs::read_to_string(&path)?;
        let snapshot = Self::from_json(&data)?;
        log::info!(
            "Loaded index snapshot {} ({} projects)",
            snapshot.index_version,
            snapshot.len()
        );
        Ok(snapshot)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(data)?;
        if raw.schema_version != INDEX_SNAPSHOT_SCHEMA_VERSION {
            return Err(HistoryError::InvalidSnapshot(format!(
                "schema_version {} is not supported (expected {})",
                raw.schema_version, INDEX_SNAPSHOT_SCHEMA_VERSION
            )));
        }
        Self::from_projects(raw.index_version, raw.embedding_dimension, raw.projects)
    }

    pub fn index_version(&self) -> &str {
        &self.index_version
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn projects(&self) -> &[HistoricalProject] {
        &self.projects
    }

    pub fn get(&self, project_id: &str) -> Option<&HistoricalProject> {
        self.by_id.get(project_id).map(|idx| &self.projects[*idx])
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            index_version: self.index_version.clone(),
            projects: self.projects.len(),
            embedding_dimension: self.dimension,
            earliest_year: self.projects.iter().map(|p| p.completion_year).min(),
            latest_year: self.projects.iter().map(|p| p.completion_year).max(),
            deliverable_samples: self.projects.iter().map(|p| p.deliverables.len()).sum(),
        }
    }
}
