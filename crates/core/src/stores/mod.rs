pub mod neo4j;
pub mod qdrant;
pub mod shadow;

pub use neo4j::Neo4jStore;
pub use qdrant::QdrantStore;
pub use shadow::ShadowWriter;
