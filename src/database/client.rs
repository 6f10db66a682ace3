// file: src/database/client.rs
// description: LanceDB client wrapper with connection management
// reference: https://docs.rs/lancedb

use crate::config::DatabaseConfig;
use crate::error::{RagError, Result};
use crate::models::{Metadata, Node, SearchResult, SourceKind};
use arrow_array::{Array, Float32Array, RecordBatch, StringArray, UInt64Array};
use futures::StreamExt;
use lancedb::arrow::SendableRecordBatchStream;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table, connect};
use tracing::{debug, info};

#[derive(Clone)]
pub struct LanceDbClient {
    connection: Connection,
    config: DatabaseConfig,
}

impl LanceDbClient {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("Connecting to LanceDB at {}", config.uri);

        let connection = connect(&config.uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self { connection, config })
    }

    pub fn get_connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn ping(&self) -> Result<bool> {
        debug!("Checking LanceDB connection");

        // Listing tables is the cheapest round trip
        match self.connection.table_names().execute().await {
            Ok(_) => {
                debug!("LanceDB connection successful");
                Ok(true)
            }
            Err(e) => Err(RagError::Database(format!(
                "LanceDB connection failed: {}",
                e
            ))),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn table_for(&self, source: SourceKind) -> &str {
        match source {
            SourceKind::Pdf => &self.config.pdf_table,
            SourceKind::Sql => &self.config.sql_table,
        }
    }

    pub fn index_tables(&self) -> [&str; 2] {
        [&self.config.pdf_table, &self.config.sql_table]
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == table_name))
    }

    pub async fn get_table(&self, table_name: &str) -> Result<Table> {
        self.connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| {
                RagError::Database(format!("Failed to open table {}: {}", table_name, e))
            })
    }

    pub async fn count_rows(&self, table_name: &str) -> Result<u64> {
        if !self.table_exists(table_name).await? {
            return Ok(0);
        }

        let table = self.get_table(table_name).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Returns `false` when there was nothing to drop.
    pub async fn drop_table(&self, table_name: &str) -> Result<bool> {
        if !self.table_exists(table_name).await? {
            return Ok(false);
        }

        self.connection.drop_table(table_name).await.map_err(|e| {
            RagError::Database(format!("Failed to drop table {}: {}", table_name, e))
        })?;

        Ok(true)
    }

    /// Search a node table by vector similarity
    ///
    /// # Returns
    /// Up to `limit` results ordered by similarity (highest first). A missing
    /// table yields no results.
    pub async fn vector_search(
        &self,
        table_name: &str,
        query_embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if !self.table_exists(table_name).await? {
            return Ok(Vec::new());
        }

        let table = self.get_table(table_name).await?;

        debug!("Vector search on {} with limit {}", table_name, limit);

        let stream = table
            .vector_search(query_embedding)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Vector search failed: {}", e)))?;

        let mut search_results = Vec::new();

        for batch in collect_batches(stream).await? {
            // LanceDB returns distance score in a special column
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            for (i, node) in nodes_from_batch(&batch)?.into_iter().enumerate() {
                let (score, distance) = match distances {
                    Some(dist_array) if dist_array.is_valid(i) => {
                        let dist = dist_array.value(i);
                        (1.0 / (1.0 + dist), Some(dist))
                    }
                    _ => (1.0, None),
                };

                search_results.push(SearchResult {
                    id: node.id,
                    doc_id: node.doc_id,
                    source: node.source,
                    content: node.content,
                    metadata: node.metadata,
                    score,
                    distance,
                });
            }
        }

        search_results.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!("Vector search returned {} results", search_results.len());
        Ok(search_results)
    }

    /// Embedding model recorded on the first row of a table; `None` when the
    /// table is missing or empty.
    pub async fn embedding_model(&self, table_name: &str) -> Result<Option<String>> {
        if !self.table_exists(table_name).await? {
            return Ok(None);
        }

        let table = self.get_table(table_name).await?;
        let stream = table
            .query()
            .limit(1)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Table scan failed: {}", e)))?;

        for batch in collect_batches(stream).await? {
            if batch.num_rows() > 0 {
                let models = string_column(&batch, "embedding_model")?;
                return Ok(Some(models.value(0).to_string()));
            }
        }

        Ok(None)
    }

    /// Every stored node of a table, without embeddings.
    pub async fn scan_all(&self, table_name: &str) -> Result<Vec<Node>> {
        let total = self.count_rows(table_name).await? as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let table = self.get_table(table_name).await?;
        let stream = table
            .query()
            .limit(total)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Table scan failed: {}", e)))?;

        let mut nodes = Vec::with_capacity(total);
        for batch in collect_batches(stream).await? {
            nodes.extend(nodes_from_batch(&batch)?);
        }

        Ok(nodes)
    }
}

async fn collect_batches(mut stream: SendableRecordBatchStream) -> Result<Vec<RecordBatch>> {
    let mut batches = Vec::new();

    while let Some(batch_result) = stream.next().await {
        let batch = batch_result
            .map_err(|e| RagError::Database(format!("Failed to read result batch: {}", e)))?;
        batches.push(batch);
    }

    Ok(batches)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid '{}' column type", name)))
}

pub(crate) fn nodes_from_batch(batch: &RecordBatch) -> Result<Vec<Node>> {
    let ids = string_column(batch, "id")?;
    let doc_ids = string_column(batch, "doc_id")?;
    let sources = string_column(batch, "source")?;
    let contents = string_column(batch, "content")?;
    let metadata = string_column(batch, "metadata")?;
    let hashes = string_column(batch, "content_hash")?;
    let created_ats = batch
        .column_by_name("created_at")
        .ok_or_else(|| RagError::Database("Missing 'created_at' column".to_string()))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| RagError::Database("Invalid 'created_at' column type".to_string()))?;

    (0..batch.num_rows())
        .map(|i| -> Result<Node> {
            let source = sources
                .value(i)
                .parse::<SourceKind>()
                .map_err(RagError::Database)?;
            let metadata: Metadata = serde_json::from_str(metadata.value(i))?;

            Ok(Node {
                id: ids.value(i).to_string(),
                doc_id: doc_ids.value(i).to_string(),
                source,
                content: contents.value(i).to_string(),
                metadata,
                content_hash: hashes.value(i).to_string(),
                created_at: created_ats.value(i),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> DatabaseConfig {
        DatabaseConfig {
            uri: dir.path().join("lancedb").display().to_string(),
            pdf_table: "pdf_test".to_string(),
            sql_table: "sql_test".to_string(),
            batch_size: 16,
        }
    }

    #[tokio::test]
    async fn test_missing_tables_are_empty() {
        let dir = TempDir::new().unwrap();
        let client = LanceDbClient::new(config(&dir)).await.unwrap();

        assert!(client.ping().await.unwrap());
        assert_eq!(client.count_rows("pdf_test").await.unwrap(), 0);
        assert!(!client.drop_table("pdf_test").await.unwrap());
        assert!(client
            .vector_search("pdf_test", vec![0.0; 4], 3)
            .await
            .unwrap()
            .is_empty());
        assert!(client.scan_all("sql_test").await.unwrap().is_empty());
        assert_eq!(client.embedding_model("sql_test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_table_routing() {
        let dir = TempDir::new().unwrap();
        let client = LanceDbClient::new(config(&dir)).await.unwrap();

        assert_eq!(client.table_for(SourceKind::Pdf), "pdf_test");
        assert_eq!(client.table_for(SourceKind::Sql), "sql_test");
        assert_eq!(client.index_tables(), ["pdf_test", "sql_test"]);
    }
}
