//! # Estimator Features
//!
//! Feature Vector Builder: turns a canonical project record into a
//! fixed-schema numeric vector plus a semantic embedding.
//!
//! - Categorical fields are one-hot encoded against a versioned vocabulary;
//!   unknown values land in an unseen bucket instead of failing.
//! - The scope description is embedded by an external encoder behind the
//!   [`EmbeddingClient`] trait, under a timeout.
//! - Required-field violations are rejected with a schema error before any
//!   model call.

mod builder;
mod embedding;
mod error;
mod types;
mod vocabulary;

pub use builder::FeatureVectorBuilder;
pub use embedding::{
    embed_with_timeout, EmbeddingClient, StubEmbedding, DEFAULT_EMBED_TIMEOUT,
};
pub use error::{FeatureError, Result};
pub use types::FeatureVector;
pub use vocabulary::{Vocabulary, UNSEEN_BUCKET, VOCABULARY_SCHEMA_VERSION};
