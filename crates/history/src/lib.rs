//! # Estimator History
//!
//! Historical project index and similarity search.
//!
//! The offline refresh job produces immutable index snapshots; this crate
//! loads them, serves cosine-similarity queries over their embeddings, and
//! publishes refreshed snapshots to concurrent readers with swap-the-pointer
//! semantics.

mod error;
mod handle;
mod similarity;
mod snapshot;

pub use error::{HistoryError, Result};
pub use handle::IndexHandle;
pub use similarity::{cosine_similarity, ScoredProject, SimilarityIndex, DEFAULT_SIMILARITY_FLOOR};
pub use snapshot::{
    DeliverableOutcome, HistoricalProject, IndexSnapshot, IndexStats,
    INDEX_SNAPSHOT_SCHEMA_VERSION,
};
