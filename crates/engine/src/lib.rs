//! # Estimator Engine
//!
//! Prediction & Similarity Engine: composes the feature builder, similarity
//! index, quantile predictor, risk attribution, deliverable aggregation and
//! confidence scoring into a single `predict` entry point.
//!
//! ## Data flow
//!
//! ```text
//! CanonicalProjectRecord
//!     │
//!     ├──> FeatureVectorBuilder ──> FeatureVector + embedding
//!     │
//!     ├──> SimilarityIndex ─┐          (concurrent)
//!     ├──> QuantilePredictor ┘
//!     │
//!     ├──> RiskMapping (needs predictor attributions)
//!     ├──> deliverable aggregation (needs comparables)
//!     ├──> confidence scoring (needs both)
//!     │
//!     └──> Prediction (invariant-checked, create-once-return)
//! ```
//!
//! Every prediction call is stateless apart from read-only snapshots of the
//! model registry and historical index, plus the process-wide prediction-id
//! counter.

mod confidence;
mod deliverables;
mod error;
mod orchestrator;
mod risk;

pub use confidence::LOW_CONFIDENCE_THRESHOLD;
pub use error::{EngineError, Result};
pub use orchestrator::{Engine, EngineConfig, DEFAULT_TOP_K};
pub use risk::{RiskMapping, RISK_MAPPING_SCHEMA_VERSION};

// Re-export the boundary types callers need alongside the engine.
pub use estimator_protocol::{
    CanonicalProjectRecord, Deliverable, EstimatedSize, Location, Prediction, RiskFactor,
    RiskyDeliverable, SimilarProject,
};
