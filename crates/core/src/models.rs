use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    RegulatoryNorms,
    ProjectWorkPlan,
    CostEstimate,
    WorkingDocs,
    Generic,
}

impl DocType {
    pub fn label(&self) -> &'static str {
        match self {
            DocType::RegulatoryNorms => "regulatory-norms",
            DocType::ProjectWorkPlan => "project-work-plan",
            DocType::CostEstimate => "cost-estimate",
            DocType::WorkingDocs => "working-docs",
            DocType::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    SkippedDuplicate,
    TooShort,
    Failed,
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::SkippedDuplicate => "skipped-duplicate",
            DocumentStatus::TooShort => "too-short",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocumentStatus::Pending | DocumentStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StructuralProfile {
    pub sections: u32,
    pub tables: u32,
    pub figures: u32,
    pub paragraphs: u32,
    pub words: u32,
    pub completeness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub content_hash: String,
    pub source_path: String,
    pub bytes: u64,
    pub doc_type: DocType,
    pub subtype: Option<String>,
    pub confidence: f64,
    pub structure: StructuralProfile,
    pub quality: f64,
    pub entities: Vec<String>,
    pub status: DocumentStatus,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRefs {
    pub materials: Vec<String>,
    pub money: Vec<String>,
    pub dates: Vec<String>,
}

impl ResourceRefs {
    pub fn count(&self) -> usize {
        self.materials.len() + self.money.len() + self.dates.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkActivity {
    pub name: String,
    pub duration_days: f64,
    pub priority: u8,
    pub quality: f64,
    pub resources: ResourceRefs,
    pub predecessors: Vec<String>,
    pub is_critical: bool,
}

/// Plain node/edge value form of an activity graph. Anything richer
/// (adjacency, in-degrees) stays transient inside the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub duration_days: f64,
}

/// Edge direction is predecessor -> successor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
}

impl DependencyGraph {
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    Structural,
    Tabular,
    Semantic,
    OverlapFallback,
}

impl ChunkStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ChunkStrategy::Structural => "structural",
            ChunkStrategy::Tabular => "tabular",
            ChunkStrategy::Semantic => "semantic",
            ChunkStrategy::OverlapFallback => "overlap-fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_hash: String,
    pub chunk_index: u64,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub strategy: ChunkStrategy,
    pub quality: f64,
    pub has_numbers: bool,
    pub has_lists: bool,
    pub has_tables: bool,
    pub truncated: bool,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_file_bytes: u64,
    pub min_text_chars: usize,
    pub confidence_floor: f64,
    pub max_activities: usize,
    pub min_chunks: usize,
    pub target_chunk_chars: usize,
    pub max_chunk_chars: usize,
    pub min_chunk_chars: usize,
    pub overlap_chars: usize,
    pub cache_budget_bytes: u64,
    pub embedding_dimensions: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            min_text_chars: 50,
            confidence_floor: 40.0,
            max_activities: 25,
            min_chunks: 3,
            target_chunk_chars: 800,
            max_chunk_chars: 1_600,
            min_chunk_chars: 60,
            overlap_chars: 120,
            cache_budget_bytes: 32 * 1024 * 1024,
            embedding_dimensions: 128,
        }
    }
}
