use crate::confidence;
use crate::deliverables;
use crate::error::{EngineError, Result};
use crate::risk::RiskMapping;
use estimator_features::{FeatureVector, FeatureVectorBuilder};
use estimator_history::{IndexHandle, IndexSnapshot, IndexStats, SimilarityIndex};
use estimator_predictor::{ModelRegistry, PredictorOutput, QuantilePredictor};
use estimator_protocol::{
    CanonicalProjectRecord, Prediction, SimilarProject, PREDICTION_SCHEMA_VERSION,
};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on `top_risk_factors`.
    pub max_risk_factors: usize,
    /// Minimum similarity for a comparable to qualify.
    pub similarity_floor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_risk_factors: 5,
            similarity_floor: estimator_history::DEFAULT_SIMILARITY_FLOOR,
        }
    }
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);
static PROCESS_EPOCH_MS: Lazy<u64> = Lazy::new(|| {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
});

/// Fresh id, unique across concurrent calls within this process.
fn next_prediction_id() -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("pred-{}-{}", *PROCESS_EPOCH_MS, seq)
}

/// Prediction Orchestrator: composes the feature builder, similarity index,
/// quantile predictor, risk attribution, deliverable aggregation and
/// confidence scoring into one entry point, and validates every output
/// invariant before returning.
pub struct Engine {
    builder: FeatureVectorBuilder,
    registry: ModelRegistry,
    index: Arc<IndexHandle>,
    risk_mapping: RiskMapping,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        builder: FeatureVectorBuilder,
        registry: ModelRegistry,
        index: Arc<IndexHandle>,
    ) -> Result<Self> {
        Ok(Self {
            builder,
            registry,
            index,
            risk_mapping: RiskMapping::builtin()?,
            config: EngineConfig::default(),
        })
    }

    pub fn with_risk_mapping(mut self, mapping: RiskMapping) -> Self {
        self.risk_mapping = mapping;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn index_handle(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.snapshot().stats()
    }

    pub fn available_model_versions(&self) -> Vec<String> {
        self.registry.available_versions()
    }

    /// Full prediction for one canonical record.
    ///
    /// `model_version: None` resolves to the latest registered artifact. The
    /// call pins one index snapshot up front and uses it end-to-end;
    /// similarity search and quantile regression run concurrently.
    pub async fn predict(
        &self,
        record: &CanonicalProjectRecord,
        top_k: usize,
        model_version: Option<&str>,
    ) -> Result<Prediction> {
        // Malformed records are rejected before anything else, including
        // model-version resolution.
        let features = self.builder.build(record).await?;
        let predictor = QuantilePredictor::new(self.registry.get(model_version)?);
        let snapshot = self.index.snapshot();
        self.assemble(record, &features, &predictor, &snapshot, top_k)
            .await
    }

    /// Degraded text-free prediction: tabular features only, no embedding
    /// call. Explicit opt-in after an embedding-unavailable failure; the
    /// comparable list is empty and the confidence score reflects that.
    pub async fn predict_text_free(
        &self,
        record: &CanonicalProjectRecord,
        top_k: usize,
        model_version: Option<&str>,
    ) -> Result<Prediction> {
        let features = self.builder.build_text_free(record)?;
        let predictor = QuantilePredictor::new(self.registry.get(model_version)?);
        let snapshot = self.index.snapshot();
        self.assemble(record, &features, &predictor, &snapshot, top_k)
            .await
    }

    /// Comparables for an already-ingested project, by stored embedding.
    pub fn get_similar(&self, project_id: &str, top_k: usize) -> Result<Vec<SimilarProject>> {
        let snapshot = self.index.snapshot();
        let results = SimilarityIndex::new(&snapshot)
            .with_floor(self.config.similarity_floor)
            .query_by_id(project_id, top_k)?;
        Ok(results)
    }

    async fn assemble(
        &self,
        record: &CanonicalProjectRecord,
        features: &FeatureVector,
        predictor: &QuantilePredictor,
        snapshot: &IndexSnapshot,
        top_k: usize,
    ) -> Result<Prediction> {
        let index = SimilarityIndex::new(snapshot).with_floor(self.config.similarity_floor);

        // Independent stages; neither waits on the other's result.
        let (scored, output) = tokio::join!(
            async {
                if features.has_embedding() {
                    index.query_scored(features.embedding(), top_k)
                } else {
                    // Text-free build: no embedding was requested, so an
                    // empty comparable set is the honest answer.
                    Ok(Vec::new())
                }
            },
            async { predictor.predict(features) },
        );
        let scored = scored?;
        let output = output?;

        let similar_projects: Vec<SimilarProject> = scored
            .iter()
            .map(|s| s.to_similar_project())
            .collect();
        let top_risk_factors = self
            .risk_mapping
            .attribute(&output.attributions, self.config.max_risk_factors);
        let risky_deliverables = deliverables::aggregate(&record.deliverables, &scored);
        let confidence_score = confidence::score(&output.cost, &similar_projects, snapshot.len());

        let prediction = Prediction {
            schema_version: PREDICTION_SCHEMA_VERSION,
            cost_p50: output.cost.p50,
            cost_p80: output.cost.p80,
            cost_p90: output.cost.p90,
            duration_p50: output.duration.p50,
            duration_p80: output.duration.p80,
            duration_p90: output.duration.p90,
            confidence_score,
            top_risk_factors,
            risky_deliverables,
            similar_projects,
            prediction_id: next_prediction_id(),
            model_version: stamp_version(&output, snapshot),
        };
        self.validate(&prediction, top_k)?;

        log::info!(
            "Prediction {} for '{}': cost_p50={:.0} confidence={:.2} comparables={}",
            prediction.prediction_id,
            record.name,
            prediction.cost_p50,
            prediction.confidence_score,
            prediction.similar_projects.len()
        );
        Ok(prediction)
    }

    /// Post-computation consistency checks. A failure here is a defect
    /// signal, surfaced as `InvariantViolation` rather than silently patched
    /// into a plausible-looking answer.
    fn validate(&self, prediction: &Prediction, top_k: usize) -> Result<()> {
        let mut violations = Vec::new();

        if !(prediction.cost_p50 <= prediction.cost_p80
            && prediction.cost_p80 <= prediction.cost_p90)
        {
            violations.push("cost quantiles are not monotonic".to_string());
        }
        if !(prediction.duration_p50 <= prediction.duration_p80
            && prediction.duration_p80 <= prediction.duration_p90)
        {
            violations.push("duration quantiles are not monotonic".to_string());
        }
        if !(0.0..=1.0).contains(&prediction.confidence_score) {
            violations.push(format!(
                "confidence_score {} outside [0, 1]",
                prediction.confidence_score
            ));
        }
        if prediction.similar_projects.len() > top_k {
            violations.push(format!(
                "{} comparables returned for top_k {}",
                prediction.similar_projects.len(),
                top_k
            ));
        }
        for pair in prediction.similar_projects.windows(2) {
            if pair[0].similarity_score < pair[1].similarity_score {
                violations.push("similar_projects not sorted descending".to_string());
                break;
            }
        }
        for similar in &prediction.similar_projects {
            if !(0.0..=1.0).contains(&similar.similarity_score) {
                violations.push(format!(
                    "similarity_score {} outside [0, 1]",
                    similar.similarity_score
                ));
                break;
            }
        }
        for risky in &prediction.risky_deliverables {
            if risky.sample_size == 0 {
                violations.push(format!(
                    "risky deliverable '{}' has sample_size 0",
                    risky.name
                ));
                break;
            }
        }
        for pair in prediction.top_risk_factors.windows(2) {
            if pair[0].severity < pair[1].severity {
                violations.push("top_risk_factors not sorted descending".to_string());
                break;
            }
        }
        if prediction.top_risk_factors.len() > self.config.max_risk_factors {
            violations.push("too many risk factors".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvariantViolation {
                model_version: prediction.model_version.clone(),
                detail: violations.join("; "),
            })
        }
    }
}

/// Stamp identifying the exact model artifact and index snapshot used.
fn stamp_version(output: &PredictorOutput, snapshot: &IndexSnapshot) -> String {
    format!("{}+{}", output.model_version, snapshot.index_version())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use estimator_features::{
        EmbeddingClient, FeatureError, StubEmbedding, Vocabulary,
    };
    use estimator_history::{DeliverableOutcome, HistoricalProject};
    use estimator_protocol::{Deliverable, EstimatedSize, Location};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    /// Client that always returns one fixed vector, so comparable scores
    /// can be dialed in exactly through the snapshot embeddings.
    struct FixedEmbedding {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl FixedEmbedding {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for FixedEmbedding {
        fn dimension(&self) -> usize {
            self.vector.len()
        }

        async fn embed(&self, _text: &str) -> estimator_features::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedding {
        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> estimator_features::Result<Vec<f32>> {
            Err(FeatureError::EmbeddingUnavailable(
                "encoder offline".to_string(),
            ))
        }
    }

    fn record() -> CanonicalProjectRecord {
        let mut record = CanonicalProjectRecord::new(
            "office-block",
            Location {
                country: "US".to_string(),
                region: "Ohio".to_string(),
            },
            "commercial_building",
            "lump_sum",
            EstimatedSize {
                value: 1_000_000.0,
                unit: "m2".to_string(),
            },
        );
        record.description = "six storey commercial office block".to_string();
        record
    }

    /// Unit vector at a given cosine against the query direction [1, 0].
    fn at_cosine(cosine: f32) -> Vec<f32> {
        vec![cosine, (1.0 - cosine * cosine).sqrt()]
    }

    fn comparable(
        name: &str,
        year: i32,
        cosine: f32,
        actual_cost: f64,
        deliverables: Vec<DeliverableOutcome>,
    ) -> HistoricalProject {
        HistoricalProject {
            project_id: name.to_string(),
            name: name.to_string(),
            completion_year: year,
            embedding: at_cosine(cosine),
            actual_cost,
            actual_duration: 400,
            deliverables,
        }
    }

    fn three_comparable_snapshot() -> IndexSnapshot {
        IndexSnapshot::from_projects(
            "idx-test",
            2,
            vec![
                comparable("mall-east", 2019, 0.81, 1_100_000.0, vec![]),
                comparable(
                    "plaza-west",
                    2021,
                    0.92,
                    950_000.0,
                    vec![DeliverableOutcome {
                        name: "foundation".to_string(),
                        estimated_cost: 100_000.0,
                        actual_cost: 125_000.0,
                    }],
                ),
                comparable("tower-north", 2020, 0.77, 1_050_000.0, vec![]),
            ],
        )
        .unwrap()
    }

    fn engine_with(snapshot: IndexSnapshot, client: Arc<dyn EmbeddingClient>) -> Engine {
        let builder = FeatureVectorBuilder::new(
            Arc::new(Vocabulary::builtin().unwrap()),
            client,
        );
        Engine::new(
            builder,
            ModelRegistry::builtin().unwrap(),
            Arc::new(IndexHandle::new(snapshot)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn three_comparables_ranked_and_p50_in_range() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let prediction = engine.predict(&record(), 5, None).await.unwrap();

        let names: Vec<&str> = prediction
            .similar_projects
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["plaza-west", "mall-east", "tower-north"]);
        let scores: Vec<f32> = prediction
            .similar_projects
            .iter()
            .map(|s| s.similarity_score)
            .collect();
        assert!((scores[0] - 0.92).abs() < 1e-3);
        assert!((scores[1] - 0.81).abs() < 1e-3);
        assert!((scores[2] - 0.77).abs() < 1e-3);

        assert!(prediction.cost_p50 >= 950_000.0 && prediction.cost_p50 <= 1_100_000.0);
        assert!(prediction.cost_p50 <= prediction.cost_p80);
        assert!(prediction.cost_p80 <= prediction.cost_p90);
        assert!(prediction.duration_p50 <= prediction.duration_p80);
        assert!(prediction.duration_p80 <= prediction.duration_p90);
        assert!((0.0..=1.0).contains(&prediction.confidence_score));
        assert!(!prediction.top_risk_factors.is_empty());
        assert_eq!(prediction.model_version, "2026.02-v1+idx-test");
        assert_eq!(prediction.schema_version, PREDICTION_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn risky_deliverables_come_from_comparables_only() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let mut record = record();
        record.deliverables = vec![
            Deliverable {
                name: "foundation".to_string(),
                quantity: 1.0,
                unit: "ls".to_string(),
            },
            Deliverable {
                name: "helipad".to_string(),
                quantity: 1.0,
                unit: "ls".to_string(),
            },
        ];
        let prediction = engine.predict(&record, 5, None).await.unwrap();

        assert_eq!(prediction.risky_deliverables.len(), 1);
        assert_eq!(prediction.risky_deliverables[0].name, "foundation");
        assert_eq!(prediction.risky_deliverables[0].sample_size, 1);
        assert!((prediction.risky_deliverables[0].avg_error - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn negative_size_rejected_before_any_model_call() {
        let client = Arc::new(FixedEmbedding::new(vec![1.0, 0.0]));
        let engine = engine_with(three_comparable_snapshot(), client.clone());
        let mut record = record();
        record.estimated_size = Some(EstimatedSize {
            value: -5.0,
            unit: "m2".to_string(),
        });

        let err = engine.predict(&record, 5, None).await.unwrap_err();
        assert!(err.is_schema_error());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn schema_errors_take_precedence_over_unknown_model_version() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let mut record = record();
        record.estimated_size = Some(EstimatedSize {
            value: -5.0,
            unit: "m2".to_string(),
        });

        let err = engine
            .predict(&record, 5, Some("2031.01-v9"))
            .await
            .unwrap_err();
        assert!(err.is_schema_error());
        assert!(!err.is_model_unavailable());
    }

    #[tokio::test]
    async fn embedding_failure_yields_no_prediction() {
        let engine = engine_with(three_comparable_snapshot(), Arc::new(FailingEmbedding));
        let err = engine.predict(&record(), 5, None).await.unwrap_err();
        assert!(err.is_embedding_unavailable());
    }

    #[tokio::test]
    async fn top_k_larger_than_index_returns_all_without_padding() {
        let snapshot = IndexSnapshot::from_projects(
            "idx-small",
            2,
            vec![
                comparable("a", 2020, 0.9, 1.0, vec![]),
                comparable("b", 2021, 0.8, 1.0, vec![]),
            ],
        )
        .unwrap();
        let engine = engine_with(snapshot, Arc::new(FixedEmbedding::new(vec![1.0, 0.0])));
        let prediction = engine.predict(&record(), 10, None).await.unwrap();
        assert_eq!(prediction.similar_projects.len(), 2);
    }

    #[tokio::test]
    async fn empty_index_degrades_instead_of_failing() {
        let engine = engine_with(
            IndexSnapshot::empty("idx-empty", 2),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let prediction = engine.predict(&record(), 5, None).await.unwrap();
        assert!(prediction.similar_projects.is_empty());
        assert!(prediction.confidence_score <= confidence::LOW_CONFIDENCE_THRESHOLD);
    }

    #[tokio::test]
    async fn identical_inputs_are_idempotent_apart_from_prediction_id() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let a = engine.predict(&record(), 5, None).await.unwrap();
        let b = engine.predict(&record(), 5, None).await.unwrap();

        assert_eq!(a.cost_p50, b.cost_p50);
        assert_eq!(a.cost_p90, b.cost_p90);
        assert_eq!(a.duration_p80, b.duration_p80);
        assert_eq!(a.confidence_score, b.confidence_score);
        assert_eq!(a.top_risk_factors, b.top_risk_factors);
        assert_eq!(a.similar_projects, b.similar_projects);
        assert_eq!(a.model_version, b.model_version);
        assert_ne!(a.prediction_id, b.prediction_id);
    }

    #[tokio::test]
    async fn prediction_ids_unique_under_concurrency() {
        let engine = Arc::new(engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        ));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.predict(&record(), 5, None).await.unwrap().prediction_id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn unknown_model_version_is_model_unavailable() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let err = engine
            .predict(&record(), 5, Some("2031.01-v9"))
            .await
            .unwrap_err();
        assert!(err.is_model_unavailable());
    }

    #[tokio::test]
    async fn text_free_mode_has_no_comparables() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(StubEmbedding::new(2)),
        );
        let prediction = engine.predict_text_free(&record(), 5, None).await.unwrap();
        assert!(prediction.similar_projects.is_empty());
        assert!(prediction.cost_p50 > 0.0);
    }

    #[tokio::test]
    async fn get_similar_looks_up_stored_embedding() {
        let engine = engine_with(
            three_comparable_snapshot(),
            Arc::new(FixedEmbedding::new(vec![1.0, 0.0])),
        );
        let similar = engine.get_similar("plaza-west", 5).unwrap();
        assert_eq!(similar.len(), 2);
        assert!(similar.iter().all(|s| s.name != "plaza-west"));

        let err = engine.get_similar("unknown-project", 5).unwrap_err();
        assert!(matches!(
            err,
            EngineError::HistoryError(estimator_history::HistoryError::NotFound(_))
        ));
    }
}
