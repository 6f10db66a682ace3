// file: src/exporter/json.rs
// description: json export of the nodes stored in each LanceDB index table

use crate::database::LanceDbClient;
use crate::error::{RagError, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedTable {
    pub table: String,
    pub file: String,
    pub total_nodes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_nodes: usize,
    pub tables: Vec<ExportedTable>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .map_err(|e| RagError::file_operation(&output_dir, e))?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every node of `table` (embeddings left out) to `<table>.json`
    /// and records it in the manifest.
    pub async fn export_index(
        &self,
        client: &LanceDbClient,
        table: &str,
        pretty: bool,
    ) -> Result<ExportManifest> {
        let exported = self.write_table(client, table, pretty).await?;
        self.write_manifest(vec![exported], pretty)
    }

    /// Exports every index table that has been built.
    pub async fn export_all(&self, client: &LanceDbClient, pretty: bool) -> Result<ExportManifest> {
        info!("Starting JSON export to {}", self.output_dir.display());

        let mut tables = Vec::new();
        for table in client.index_tables() {
            if !client.table_exists(table).await? {
                warn!("Skipping {}: index has not been built", table);
                continue;
            }
            tables.push(self.write_table(client, table, pretty).await?);
        }

        self.write_manifest(tables, pretty)
    }

    async fn write_table(
        &self,
        client: &LanceDbClient,
        table: &str,
        pretty: bool,
    ) -> Result<ExportedTable> {
        if !client.table_exists(table).await? {
            return Err(RagError::IndexNotBuilt(table.to_string()));
        }

        let nodes = client.scan_all(table).await?;
        let file = format!("{}.json", table);
        self.write_json(&file, &nodes, pretty)?;
        info!("Exported {} nodes from {} to {}", nodes.len(), table, file);

        Ok(ExportedTable {
            table: table.to_string(),
            file,
            total_nodes: nodes.len(),
        })
    }

    fn write_manifest(&self, tables: Vec<ExportedTable>, pretty: bool) -> Result<ExportManifest> {
        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_nodes: tables.iter().map(|t| t.total_nodes).sum(),
            tables,
        };

        self.write_json(MANIFEST_FILE, &manifest, pretty)?;
        info!(
            "Export complete: {} nodes in {} files",
            manifest.total_nodes,
            manifest.tables.len()
        );
        Ok(manifest)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T, pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        let path = self.output_dir.join(file);
        fs::write(&path, json).map_err(|e| RagError::file_operation(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::BatchInserter;
    use crate::llm::EmbeddingClient;
    use crate::models::{Document, Metadata, Node, SourceKind};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    async fn client(dir: &Path) -> LanceDbClient {
        LanceDbClient::new(DatabaseConfig {
            uri: dir.join("lancedb").display().to_string(),
            pdf_table: "pdf_index".to_string(),
            sql_table: "sql_index".to_string(),
            batch_size: 4,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_export_index_writes_nodes_and_manifest() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;
        let embedder = EmbeddingClient::offline(16);

        let document = Document::new(SourceKind::Pdf, "Quarterly revenue".to_string(), Metadata::new())
            .with_metadata("page_label", "3");
        let node = Node::from_chunk(&document, document.text.clone());
        BatchInserter::new(&client, &embedder)
            .insert_nodes("pdf_index", &[node.clone()], None)
            .await
            .unwrap();

        let exporter = JsonExporter::new(dir.path().join("out")).unwrap();
        let manifest = exporter.export_index(&client, "pdf_index", true).await.unwrap();

        assert_eq!(manifest.total_nodes, 1);
        assert_eq!(manifest.tables[0].file, "pdf_index.json");

        let json = fs::read_to_string(exporter.output_dir().join("pdf_index.json")).unwrap();
        let nodes: Vec<Node> = serde_json::from_str(&json).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].content, "Quarterly revenue");
        assert_eq!(nodes[0].metadata.get("page_label").map(String::as_str), Some("3"));
        assert!(exporter.output_dir().join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_export_all_skips_missing_tables() {
        let dir = tempdir().unwrap();
        let client = client(dir.path()).await;

        let exporter = JsonExporter::new(dir.path().join("out")).unwrap();
        let manifest = exporter.export_all(&client, false).await.unwrap();
        assert_eq!(manifest.total_nodes, 0);
        assert!(manifest.tables.is_empty());

        let result = exporter.export_index(&client, "sql_index", false).await;
        assert!(matches!(result, Err(RagError::IndexNotBuilt(_))));
    }
}
