use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use estimator_engine::{Engine, DEFAULT_TOP_K};
use estimator_features::{FeatureVectorBuilder, StubEmbedding, Vocabulary};
use estimator_history::{IndexHandle, IndexSnapshot};
use estimator_predictor::ModelRegistry;
use estimator_protocol::CanonicalProjectRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Embedding width used when no index snapshot dictates one.
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

#[derive(Parser)]
#[command(name = "estimator")]
#[command(about = "Project cost and schedule estimation engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict cost/duration quantiles for a canonical project record
    Predict {
        /// Path to the project record JSON
        #[arg(long)]
        record: PathBuf,

        /// Historical index snapshot JSON (omit for an empty index)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Number of comparables to retrieve
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Model version to use (defaults to the latest registered)
        #[arg(long)]
        model_version: Option<String>,

        /// Extra model artifact JSON to register
        #[arg(long)]
        model: Option<PathBuf>,

        /// Vocabulary artifact override
        #[arg(long)]
        vocabulary: Option<PathBuf>,

        /// Degraded text-free mode: skip the embedding call entirely
        #[arg(long)]
        no_embedding: bool,
    },

    /// List comparables for an already-indexed project
    Similar {
        /// Project id as stored in the index snapshot
        #[arg(long)]
        project_id: String,

        /// Historical index snapshot JSON
        #[arg(long)]
        index: PathBuf,

        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Summarize a historical index snapshot
    IndexStats {
        /// Historical index snapshot JSON
        #[arg(long)]
        index: PathBuf,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn load_snapshot(path: Option<&Path>) -> Result<IndexSnapshot> {
    match path {
        Some(path) => IndexSnapshot::load(path)
            .with_context(|| format!("failed to load index snapshot {}", path.display())),
        None => {
            log::warn!("No index snapshot given; predictions will have no comparables");
            Ok(IndexSnapshot::empty("empty", DEFAULT_EMBEDDING_DIMENSION))
        }
    }
}

fn load_record(path: &Path) -> Result<CanonicalProjectRecord> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read record {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse record {}", path.display()))
}

fn build_engine(
    snapshot: IndexSnapshot,
    vocabulary: Option<&Path>,
    model: Option<&Path>,
) -> Result<Engine> {
    let vocabulary = match vocabulary {
        Some(path) => Vocabulary::from_path(path)?,
        None => Vocabulary::builtin()?,
    };
    let mut registry = ModelRegistry::builtin()?;
    if let Some(path) = model {
        registry.register_path(path)?;
    }
    let dimension = snapshot.dimension();
    let builder = FeatureVectorBuilder::new(
        Arc::new(vocabulary),
        Arc::new(StubEmbedding::new(dimension)),
    );
    Ok(Engine::new(
        builder,
        registry,
        Arc::new(IndexHandle::new(snapshot)),
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Predict {
            record,
            index,
            top_k,
            model_version,
            model,
            vocabulary,
            no_embedding,
        } => {
            let record = load_record(&record)?;
            let snapshot = load_snapshot(index.as_deref())?;
            let engine = build_engine(snapshot, vocabulary.as_deref(), model.as_deref())?;
            log::debug!(
                "Registered model versions: {}",
                engine.available_model_versions().join(", ")
            );

            let prediction = if no_embedding {
                engine
                    .predict_text_free(&record, top_k, model_version.as_deref())
                    .await?
            } else {
                engine
                    .predict(&record, top_k, model_version.as_deref())
                    .await?
            };
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }

        Commands::Similar {
            project_id,
            index,
            top_k,
        } => {
            let snapshot = load_snapshot(Some(&index))?;
            let engine = build_engine(snapshot, None, None)?;
            let similar = engine.get_similar(&project_id, top_k)?;
            println!("{}", serde_json::to_string_pretty(&similar)?);
        }

        Commands::IndexStats { index } => {
            let snapshot = load_snapshot(Some(&index))?;
            println!("{}", serde_json::to_string_pretty(&snapshot.stats())?);
        }
    }

    Ok(())
}
