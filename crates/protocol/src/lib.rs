//! Boundary data model shared by every estimator crate.
//!
//! The input side (`CanonicalProjectRecord` and friends) mirrors what the
//! ingestion pipeline emits; the output side (`Prediction`) is the engine's
//! sole result type, serialized with the flat field names callers depend on.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PREDICTION_SCHEMA_VERSION: u32 = 1;

/// Country/region pair as canonicalized by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub country: String,
    pub region: String,
}

/// Project magnitude in the unit the record was ingested with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EstimatedSize {
    pub value: f64,
    pub unit: String,
}

/// A scoped deliverable line item (e.g. "foundation", 1200.0, "m3").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Deliverable {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// Immutable canonical project description produced by the ingestion
/// collaborator. The engine never mutates it.
///
/// `project_type`, `contract_type` and `estimated_size` are required by the
/// feature builder; they are lenient here (defaulted/optional) so that the
/// engine, not the deserializer, rejects them with an actionable
/// `SchemaError` naming the offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalProjectRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: Location,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default)]
    pub estimated_size: Option<EstimatedSize>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
}

/// A named driver of cost/schedule deviation attributed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskFactor {
    pub name: String,
    pub impact: String,
    /// Normalized share of total positive contribution, in [0, 1].
    pub severity: f32,
}

/// Historical misestimation statistics for one deliverable type.
///
/// Never constructed with `sample_size` 0; deliverables with no historical
/// match are omitted from the output entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskyDeliverable {
    pub name: String,
    /// Mean absolute percentage error between estimated and actual cost.
    pub avg_error: f64,
    pub sample_size: usize,
}

/// A historical comparable retrieved by embedding similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimilarProject {
    pub name: String,
    pub year: i32,
    pub actual_cost: f64,
    pub actual_duration: i64,
    /// Cosine similarity mapped into [0, 1].
    pub similarity_score: f32,
}

/// The engine's sole output. Immutable once constructed; create-once-return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prediction {
    /// Always [`PREDICTION_SCHEMA_VERSION`]; lets consumers detect payloads
    /// from a newer engine before touching the other fields.
    pub schema_version: u32,
    pub cost_p50: f64,
    pub cost_p80: f64,
    pub cost_p90: f64,
    pub duration_p50: i64,
    pub duration_p80: i64,
    pub duration_p90: i64,
    pub confidence_score: f32,
    pub top_risk_factors: Vec<RiskFactor>,
    pub risky_deliverables: Vec<RiskyDeliverable>,
    pub similar_projects: Vec<SimilarProject>,
    pub prediction_id: String,
    pub model_version: String,
}

impl CanonicalProjectRecord {
    /// Convenience constructor for the fields the engine requires; callers
    /// fill in deliverables and description as needed.
    pub fn new(
        name: impl Into<String>,
        location: Location,
        project_type: impl Into<String>,
        contract_type: impl Into<String>,
        estimated_size: EstimatedSize,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            location,
            project_type: project_type.into(),
            contract_type: contract_type.into(),
            estimated_size: Some(estimated_size),
            deliverables: Vec::new(),
        }
    }
}
