// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod database;
pub mod error;
pub mod exporter;
pub mod index;
pub mod llm;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod sources;
pub mod utils;

pub use config::{Config, DatabaseConfig, IndexConfig, LlmConfig, SourcesConfig};
pub use database::{BatchInserter, InsertStats, LanceDbClient, SchemaManager};
pub use error::{RagError, Result};
pub use exporter::{ExportManifest, ExportedTable, JsonExporter};
pub use index::{QueryEngine, QueryEngineTool, Response, RouterQueryEngine, VectorStoreIndex};
pub use llm::{CompletionClient, EmbeddingClient};
pub use loader::{PdfLoader, SqlDatabaseReader, TableSummary, TextChunker};
pub use models::{Document, Node, SearchResult, SourceKind};
pub use pipeline::{PipelineStats, ProgressDisplay, ProgressTracker};
pub use session::{Answer, IndexReport, QueryMode, RagSession};
pub use sources::{SourcePaths, SourceResolver, SourceSelection};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert_eq!(config.database.pdf_table, "pdf_index");
        assert_eq!(QueryMode::default(), QueryMode::Both);
    }
}
