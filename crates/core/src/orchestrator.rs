use crate::activities::ActivityExtractor;
use crate::cache::EmbeddingCache;
use crate::chunking::chunk_document;
use crate::classifier::Classifier;
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::enrich::profile_for;
use crate::error::PipelineError;
use crate::extract::extract_text;
use crate::ingest::{digest_bytes, validate_source};
use crate::ledger::{IntakeLedger, LedgerEntry};
use crate::models::{Chunk, DocType, DocumentRecord, DocumentStatus, PipelineOptions};
use crate::quality::{score_document, QualitySignals};
use crate::queue;
use crate::schedule::compute_schedule;
use crate::stores::ShadowWriter;
use crate::structure::StructuralAnalyzer;
use crate::traits::{GraphSink, VectorSink};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Extract,
    Classify,
    Analyze,
    Activities,
    Schedule,
    Score,
    Enrich,
    Chunk,
    Embed,
    Persist,
    Commit,
}

impl Stage {
    pub fn id(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Classify => "classify",
            Stage::Analyze => "analyze",
            Stage::Activities => "activities",
            Stage::Schedule => "schedule",
            Stage::Score => "score",
            Stage::Enrich => "enrich",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Persist => "persist",
            Stage::Commit => "commit",
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            Stage::Validate => 5,
            Stage::Extract => 15,
            Stage::Classify => 25,
            Stage::Analyze => 35,
            Stage::Activities => 45,
            Stage::Schedule => 55,
            Stage::Score => 65,
            Stage::Enrich => 70,
            Stage::Chunk => 80,
            Stage::Embed => 90,
            Stage::Persist => 95,
            Stage::Commit => 100,
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(Stage, &str, u8) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub status: DocumentStatus,
    pub stage: Option<&'static str>,
    pub detail: Option<String>,
    pub shadowed: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub counts: HashMap<DocumentStatus, usize>,
    pub outcomes: Vec<DocumentOutcome>,
    pub shadowed: usize,
}

impl RunSummary {
    pub fn count(&self, status: DocumentStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

struct StageFailure {
    stage: Stage,
    error: PipelineError,
}

fn at(stage: Stage) -> impl Fn(PipelineError) -> StageFailure {
    move |error| StageFailure { stage, error }
}

fn status_for(error: &PipelineError) -> DocumentStatus {
    match error {
        PipelineError::Extraction(_) => DocumentStatus::TooShort,
        _ => DocumentStatus::Failed,
    }
}

pub struct Pipeline<G, V>
where
    G: GraphSink + Send + Sync + 'static,
    V: VectorSink + Send + Sync + 'static,
{
    options: PipelineOptions,
    classifier: Classifier,
    analyzer: StructuralAnalyzer,
    extractor: ActivityExtractor,
    embedder: CharacterNgramEmbedder,
    ledger: IntakeLedger,
    cache: EmbeddingCache,
    shadow: ShadowWriter,
    graph: G,
    vector: V,
    progress: Option<ProgressCallback>,
}

impl<G, V> Pipeline<G, V>
where
    G: GraphSink + Send + Sync + 'static,
    V: VectorSink + Send + Sync + 'static,
{
    pub fn new(
        options: PipelineOptions,
        ledger: IntakeLedger,
        cache: EmbeddingCache,
        shadow: ShadowWriter,
        graph: G,
        vector: V,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            classifier: Classifier::new()?,
            analyzer: StructuralAnalyzer::new()?,
            extractor: ActivityExtractor::new()?,
            embedder: CharacterNgramEmbedder::new(options.embedding_dimensions),
            options,
            ledger,
            cache,
            shadow,
            graph,
            vector,
            progress: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub async fn init(&self) -> Result<(), PipelineError> {
        self.ledger.load().await?;
        self.cache.load().await
    }

    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        self.cache.flush().await?;
        self.ledger.flush().await
    }

    pub fn ledger(&self) -> &IntakeLedger {
        &self.ledger
    }

    pub fn shadow(&self) -> &ShadowWriter {
        &self.shadow
    }

    /// Runs the whole stage sequence for one document. Never panics and
    /// never propagates an error: every input maps to a terminal status.
    pub async fn process(&self, path: &Path) -> DocumentStatus {
        self.process_outcome(path).await.status
    }

    pub async fn process_outcome(&self, path: &Path) -> DocumentOutcome {
        match self.try_process(path).await {
            Ok((status, shadowed)) => DocumentOutcome {
                path: path.to_path_buf(),
                status,
                stage: None,
                detail: None,
                shadowed,
            },
            Err(failure) => {
                let status = status_for(&failure.error);
                warn!(
                    path = %path.display(),
                    stage = failure.stage.id(),
                    error = %failure.error,
                    status = status.label(),
                    "document left the pipeline early"
                );
                DocumentOutcome {
                    path: path.to_path_buf(),
                    status,
                    stage: Some(failure.stage.id()),
                    detail: Some(failure.error.to_string()),
                    shadowed: false,
                }
            }
        }
    }

    async fn try_process(
        &self,
        path: &Path,
    ) -> Result<(DocumentStatus, bool), StageFailure> {
        self.report(Stage::Validate, "validating source");
        let bytes_len = validate_source(path, &self.options).map_err(at(Stage::Validate))?;
        let content = std::fs::read(path).map_err(|error| {
            at(Stage::Validate)(PipelineError::Validation(format!(
                "unreadable file {}: {error}",
                path.display()
            )))
        })?;
        let content_hash = digest_bytes(&content);

        if self.ledger.is_completed(&content_hash).await {
            debug!(path = %path.display(), "already completed, skipping");
            return Ok((DocumentStatus::SkippedDuplicate, false));
        }

        match self
            .run_stages(path, &content, bytes_len, &content_hash)
            .await
        {
            Ok(shadowed) => Ok((DocumentStatus::Completed, shadowed)),
            Err(failure) => {
                // Terminal failure state is recorded too, but only a
                // "completed" entry short-circuits future runs.
                let entry = LedgerEntry {
                    source: path.to_string_lossy().to_string(),
                    processed_at: Utc::now(),
                    doc_type: DocType::Generic,
                    quality: 0.0,
                    status: status_for(&failure.error),
                };
                if let Err(ledger_error) = self.ledger.upsert(&content_hash, entry).await {
                    warn!(
                        path = %path.display(),
                        error = %ledger_error,
                        "failed to record terminal status"
                    );
                }
                Err(failure)
            }
        }
    }

    async fn run_stages(
        &self,
        path: &Path,
        content: &[u8],
        bytes_len: u64,
        content_hash: &str,
    ) -> Result<bool, StageFailure> {
        self.report(Stage::Extract, "extracting text");
        let text = extract_text(path, content).map_err(at(Stage::Extract))?;
        let text_chars = text.chars().count();
        if text_chars < self.options.min_text_chars {
            return Err(at(Stage::Extract)(PipelineError::Extraction(format!(
                "only {text_chars} chars of usable text in {}",
                path.display()
            ))));
        }

        self.report(Stage::Classify, "classifying document");
        let classification = self.classifier.classify(&text);
        let profile_handle = profile_for(classification.doc_type);
        debug!(
            doc_type = classification.doc_type.label(),
            confidence = classification.confidence,
            "classified"
        );

        self.report(Stage::Analyze, "analyzing structure");
        let outline = self.analyzer.outline(&text);
        let structure =
            self.analyzer
                .profile(&text, &outline, profile_handle.expected_sections());

        self.report(Stage::Activities, "extracting work activities");
        let use_generic = !classification.is_confident(self.options.confidence_floor);
        let mut extracted =
            self.extractor
                .extract(&text, &outline, use_generic, self.options.max_activities);

        self.report(Stage::Schedule, "computing the critical path");
        let schedule = compute_schedule(&extracted.graph);
        if schedule.has_cycles {
            warn!(path = %path.display(), "dependency cycle detected, no critical path");
        }
        for activity in &mut extracted.activities {
            activity.is_critical = schedule
                .timing_for(&activity.name)
                .is_some_and(|timing| timing.is_critical());
        }

        self.report(Stage::Score, "scoring quality");
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

        self.report(Stage::Enrich, "extracting typed entities");
        let entities = profile_handle
            .extract_entities(&text)
            .map_err(at(Stage::Enrich))?;

        let document = DocumentRecord {
            content_hash: content_hash.to_string(),
            source_path: path.to_string_lossy().to_string(),
            bytes: bytes_len,
            doc_type: classification.doc_type,
            subtype: classification.subtype.clone(),
            confidence: classification.confidence,
            structure,
            quality,
            entities,
            status: DocumentStatus::Completed,
            processed_at: Utc::now(),
        };

        self.report(Stage::Chunk, "chunking");
        let chunks = chunk_document(&text, &outline, content_hash, &self.options)
            .map_err(at(Stage::Chunk))?;

        self.report(Stage::Embed, "embedding chunks");
        let embeddings = self.embed_chunks(&chunks).await;

        self.report(Stage::Persist, "writing to stores");
        let graph_result = self
            .graph
            .upsert_document(&document, &extracted.activities)
            .await;
        let vector_result = self
            .vector
            .upsert_chunks(&document, &chunks, &embeddings)
            .await;

        let mut shadowed = false;
        if let Err(store_error) = graph_result.and(vector_result) {
            warn!(
                path = %path.display(),
                error = %store_error,
                "store write failed, spooling shadow copy"
            );
            self.shadow
                .record(
                    &document,
                    &extracted.activities,
                    &chunks,
                    &store_error.to_string(),
                )
                .await
                .map_err(at(Stage::Persist))?;
            shadowed = true;
        }

        let entry = LedgerEntry {
            source: document.source_path.clone(),
            processed_at: document.processed_at,
            doc_type: document.doc_type,
            quality: document.quality,
            status: DocumentStatus::Completed,
        };
        self.ledger
            .upsert(content_hash, entry)
            .await
            .map_err(at(Stage::Commit))?;
        self.report(Stage::Commit, "completed");

        Ok(shadowed)
    }

    // Cache first, then one batch for the misses.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Vec<Vec<f32>> {
        let model_id = self.embedder.model_id().to_string();

        let mut embeddings: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            embeddings.push(self.cache.get(&chunk.text, &model_id).await);
        }

        let missing: Vec<usize> = embeddings
            .iter()
            .enumerate()
            .filter(|(_, embedding)| embedding.is_none())
            .map(|(index, _)| index)
            .collect();

        if !missing.is_empty() {
            let texts: Vec<&str> = missing
                .iter()
                .map(|&index| chunks[index].text.as_str())
                .collect();
            let computed = self.embedder.embed_batch(&texts);
            for (&index, vector) in missing.iter().zip(computed.into_iter()) {
                self.cache
                    .set(&chunks[index].text, &model_id, vector.clone())
                    .await;
                embeddings[index] = Some(vector);
            }
        }

        embeddings
            .into_iter()
            .map(|embedding| {
                embedding.unwrap_or_else(|| vec![0.0; self.embedder.dimensions()])
            })
            .collect()
    }

    /// Processes a batch with a pool of workers over disjoint shards of
    /// the priority-sorted queue.
    pub async fn run_batch(self: Arc<Self>, paths: &[PathBuf], workers: usize) -> RunSummary {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            documents = paths.len(),
            workers,
            "starting ingestion run"
        );

        let queue_items = queue::build_queue(paths);
        let shards = queue::shard(queue_items, workers);

        let mut handles = Vec::new();
        for shard in shards {
            if shard.is_empty() {
                continue;
            }
            let pipeline = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                for item in shard {
                    outcomes.push(pipeline.process_outcome(&item.path).await);
                }
                outcomes
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(worker_outcomes) => outcomes.extend(worker_outcomes),
                Err(join_error) => warn!(error = %join_error, "worker task aborted"),
            }
        }

        let mut counts: HashMap<DocumentStatus, usize> = HashMap::new();
        let mut shadowed = 0usize;
        for outcome in &outcomes {
            *counts.entry(outcome.status).or_insert(0) += 1;
            if outcome.shadowed {
                shadowed += 1;
            }
        }

        info!(run_id = %run_id, processed = outcomes.len(), shadowed, "run finished");

        RunSummary {
            run_id,
            counts,
            outcomes,
            shadowed,
        }
    }

    fn report(&self, stage: Stage, message: &str) {
        if let Some(callback) = &self.progress {
            callback(stage, message, stage.percent());
        }
        debug!(stage = stage.id(), percent = stage.percent(), "{message}");
    }
}
