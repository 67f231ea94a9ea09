use chrono::Utc;
use clap::{Parser, Subcommand};
use ntd_ingest_core::{
    compute_schedule, discover_documents, extract_text, profile_for, score_document,
    ActivityExtractor, Classifier, DocumentStatus, EmbeddingCache, IntakeLedger, Neo4jStore,
    Pipeline, PipelineOptions, QdrantStore, QualitySignals, ShadowWriter, StructuralAnalyzer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ntd-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "ntd_chunks")]
    qdrant_collection: String,

    /// Neo4j HTTP transaction URL
    #[arg(long, default_value = "http://localhost:7474")]
    neo4j_url: String,

    /// Neo4j database name
    #[arg(long, default_value = "neo4j")]
    neo4j_db: String,

    /// Neo4j username
    #[arg(long, default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, default_value = "password")]
    neo4j_password: String,

    /// Intake ledger path
    #[arg(long, default_value = ".ntd/ledger.json")]
    ledger_path: PathBuf,

    /// Embedding cache path
    #[arg(long, default_value = ".ntd/embedding-cache.json")]
    cache_path: PathBuf,

    /// Shadow spool directory for unreachable backends
    #[arg(long, default_value = ".ntd/shadow")]
    shadow_dir: PathBuf,

    /// Embedding cache budget, megabytes
    #[arg(long, default_value = "32")]
    cache_budget_mb: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Process a folder of documents into the graph and vector stores.
    Ingest {
        /// Folder scanned recursively for supported documents.
        #[arg(long)]
        folder: String,
        /// Parallel workers over disjoint queue shards.
        #[arg(long, default_value = "4")]
        workers: usize,
    },
    /// Classify and analyze a single document without persisting anything.
    Inspect {
        /// Document to analyze.
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "ntd-ingest boot"
    );

    match &cli.command {
        Command::Ingest { folder, workers } => ingest(&cli, folder, *workers).await,
        Command::Inspect { file } => inspect(file),
    }
}

async fn ingest(cli: &Cli, folder: &str, workers: usize) -> anyhow::Result<()> {
    let folder = Path::new(folder);
    let paths = discover_documents(folder);
    if paths.is_empty() {
        println!("no supported documents found in {}", folder.display());
        return Ok(());
    }

    let options = PipelineOptions {
        cache_budget_bytes: cli.cache_budget_mb * 1024 * 1024,
        ..PipelineOptions::default()
    };

    let graph = Neo4jStore::new(
        &cli.neo4j_url,
        &cli.neo4j_db,
        &cli.neo4j_user,
        &cli.neo4j_password,
    );
    let vector = QdrantStore::new(
        &cli.qdrant_url,
        &cli.qdrant_collection,
        options.embedding_dimensions,
    );
    if let Err(error) = vector.ensure_collection().await {
        // Processing still runs; writes will land in the shadow spool.
        warn!(%error, "qdrant collection setup failed");
    }

    let pipeline = Pipeline::new(
        options,
        IntakeLedger::new(&cli.ledger_path),
        EmbeddingCache::new(&cli.cache_path, cli.cache_budget_mb * 1024 * 1024),
        ShadowWriter::new(&cli.shadow_dir),
        graph,
        vector,
    )
    .map_err(|error| anyhow::anyhow!(error.to_string()))?
    .with_progress(Arc::new(|stage, message, percent| {
        info!(stage = stage.id(), percent, "{message}");
    }));

    pipeline
        .init()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let pipeline = Arc::new(pipeline);
    let summary = Arc::clone(&pipeline).run_batch(&paths, workers).await;

    println!(
        "run {} over {} document(s):",
        summary.run_id,
        summary.outcomes.len()
    );
    for status in [
        DocumentStatus::Completed,
        DocumentStatus::SkippedDuplicate,
        DocumentStatus::TooShort,
        DocumentStatus::Failed,
    ] {
        let count = summary.count(status);
        if count > 0 {
            println!("  {}: {count}", status.label());
        }
    }
    if summary.shadowed > 0 {
        println!(
            "  {} document(s) spooled to {} for reconciliation",
            summary.shadowed,
            cli.shadow_dir.display()
        );
    }
    for outcome in &summary.outcomes {
        if let (Some(stage), Some(detail)) = (outcome.stage, &outcome.detail) {
            println!(
                "  {} [{}] {}: {detail}",
                outcome.path.display(),
                stage,
                outcome.status.label()
            );
        }
    }

    pipeline
        .shutdown()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    Ok(())
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)?;
    let text =
        extract_text(file, &bytes).map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let classifier = Classifier::new().map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let analyzer =
        StructuralAnalyzer::new().map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let extractor =
        ActivityExtractor::new().map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let options = PipelineOptions::default();

    let classification = classifier.classify(&text);
    let profile_handle = profile_for(classification.doc_type);
    let outline = analyzer.outline(&text);
    let structure = analyzer.profile(&text, &outline, profile_handle.expected_sections());

    let use_generic = !classification.is_confident(options.confidence_floor);
    let mut extracted =
        extractor.extract(&text, &outline, use_generic, options.max_activities);
    let schedule = compute_schedule(&extracted.graph);
    for activity in &mut extracted.activities {
        activity.is_critical = schedule
            .timing_for(&activity.name)
            .is_some_and(|timing| timing.is_critical());
    }

    let resource_count: usize = extracted
        .activities
        .iter()
        .map(|activity| activity.resources.count())
        .sum();
    let quality = score_document(&QualitySignals {
        confidence: classification.confidence,
        words: structure.words,
        sections: structure.sections,
        tables: structure.tables,
        activity_count: extracted.activities.len(),
        entity_count: resource_count,
    });
    let entities = profile_handle
        .extract_entities(&text)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    println!("file: {}", file.display());
    println!(
        "type: {} (subtype: {}, confidence: {:.1})",
        classification.doc_type.label(),
        classification.subtype.as_deref().unwrap_or("-"),
        classification.confidence
    );
    println!(
        "structure: {} section(s), {} table(s), {} figure(s), {} word(s), completeness {:.2}",
        structure.sections,
        structure.tables,
        structure.figures,
        structure.words,
        structure.completeness
    );
    println!("quality: {quality:.2}");

    println!("activities ({}):", extracted.activities.len());
    for activity in &extracted.activities {
        let critical = if activity.is_critical { " [critical]" } else { "" };
        println!(
            "  {} duration={:.1}d priority={}{}",
            activity.name, activity.duration_days, activity.priority, critical
        );
        if !activity.predecessors.is_empty() {
            println!("    after: {}", activity.predecessors.join(", "));
        }
    }

    if schedule.has_cycles {
        println!("schedule: dependency cycle detected, no critical path");
    } else if !schedule.critical_path.is_empty() {
        println!(
            "critical path ({:.1}d): {}",
            schedule.total_duration,
            schedule.critical_path.join(" -> ")
        );
    }

    if !entities.is_empty() {
        println!("entities: {}", entities.join("; "));
    }

    Ok(())
}
