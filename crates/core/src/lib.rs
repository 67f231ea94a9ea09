pub mod activities;
pub mod cache;
pub mod chunking;
pub mod classifier;
pub mod embeddings;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod quality;
pub mod queue;
pub mod schedule;
pub mod stores;
pub mod structure;
pub mod traits;

pub use activities::{ActivityExtractor, ExtractedActivities};
pub use cache::{CacheEntry, EmbeddingCache};
pub use chunking::{chunk_document, normalize_whitespace};
pub use classifier::{Classification, Classifier};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use enrich::{profile_for, TypeProfile};
pub use error::{PipelineError, StoreError};
pub use extract::extract_text;
pub use ingest::{digest_bytes, discover_documents, validate_source, SUPPORTED_EXTENSIONS};
pub use ledger::{IntakeLedger, LedgerEntry};
pub use models::{
    Chunk, ChunkStrategy, DependencyGraph, DocType, DocumentRecord, DocumentStatus, GraphEdge,
    GraphNode, PipelineOptions, ResourceRefs, StructuralProfile, WorkActivity,
};
pub use orchestrator::{
    DocumentOutcome, Pipeline, ProgressCallback, RunSummary, Stage,
};
pub use quality::{score_document, QualitySignals, QUALITY_FLOOR};
pub use queue::{build_queue, priority_for, shard, QueueItem};
pub use schedule::{compute_schedule, ActivityTiming, Schedule};
pub use stores::{Neo4jStore, QdrantStore, ShadowWriter};
pub use structure::{Outline, SectionSpan, StructuralAnalyzer, TableSpan};
pub use traits::{GraphSink, VectorSink};
