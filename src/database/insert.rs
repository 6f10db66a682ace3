// file: src/database/insert.rs
// description: LanceDB batch insertion of nodes with vector embeddings
// reference: https://docs.rs/lancedb

use crate::database::client::LanceDbClient;
use crate::database::schema::{SchemaManager, embedding_item_field};
use crate::error::{RagError, Result};
use crate::llm::EmbeddingClient;
use crate::models::Node;
use crate::pipeline::ProgressTracker;
use arrow_array::{
    FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array,
};
use arrow_schema::Schema;
use std::sync::Arc;
use tracing::{debug, info};

pub struct BatchInserter<'a> {
    client: &'a LanceDbClient,
    embedder: &'a EmbeddingClient,
}

#[derive(Debug, Clone, Default)]
pub struct InsertStats {
    pub nodes_inserted: usize,
    pub batches: usize,
}

impl<'a> BatchInserter<'a> {
    pub fn new(client: &'a LanceDbClient, embedder: &'a EmbeddingClient) -> Self {
        Self { client, embedder }
    }

    /// Embeds and appends `nodes` to `table_name` in `batch_size` slices.
    ///
    /// The table is created from the first batch when it does not exist yet.
    pub async fn insert_nodes(
        &self,
        table_name: &str,
        nodes: &[Node],
        progress: Option<&ProgressTracker>,
    ) -> Result<InsertStats> {
        let mut stats = InsertStats::default();
        if nodes.is_empty() {
            return Ok(stats);
        }

        let dim = self.embedder.dimension();
        let model = self.embedder.model_id();
        let schema = SchemaManager::get_nodes_schema(dim);
        let mut table = if self.client.table_exists(table_name).await? {
            Some(self.client.get_table(table_name).await?)
        } else {
            None
        };

        for batch in nodes.chunks(self.client.batch_size().max(1)) {
            let texts: Vec<String> = batch.iter().map(Node::embedding_text).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let record_batch = Self::create_record_batch(schema.clone(), batch, &embeddings, dim, &model)?;
            let reader = RecordBatchIterator::new(vec![Ok(record_batch)], schema.clone());

            match &table {
                Some(existing) => {
                    existing.add(reader).execute().await.map_err(|e| {
                        RagError::Database(format!("Failed to insert nodes: {}", e))
                    })?;
                }
                None => {
                    let created = self
                        .client
                        .get_connection()
                        .create_table(table_name, reader)
                        .execute()
                        .await
                        .map_err(|e| {
                            RagError::Database(format!("Failed to create table: {}", e))
                        })?;
                    info!("Created new table: {}", table_name);
                    table = Some(created);
                }
            }

            stats.nodes_inserted += batch.len();
            stats.batches += 1;

            if let Some(progress) = progress {
                progress.inc_nodes(batch.len());
                progress.add_bytes_processed(texts.iter().map(|t| t.len() as u64).sum());
            }
            debug!(
                "Inserted batch {} ({} nodes) into {}",
                stats.batches,
                batch.len(),
                table_name
            );
        }

        Ok(stats)
    }

    /// Create an Arrow RecordBatch from nodes and embeddings
    fn create_record_batch(
        schema: Arc<Schema>,
        nodes: &[Node],
        embeddings: &[Vec<f32>],
        dim: usize,
        model: &str,
    ) -> Result<RecordBatch> {
        if nodes.len() != embeddings.len() {
            return Err(RagError::Database(format!(
                "{} nodes but {} embeddings",
                nodes.len(),
                embeddings.len()
            )));
        }

        let ids: StringArray = nodes.iter().map(|n| Some(n.id.as_str())).collect();
        let doc_ids: StringArray = nodes.iter().map(|n| Some(n.doc_id.as_str())).collect();
        let sources: StringArray = nodes.iter().map(|n| Some(n.source.as_str())).collect();
        let contents: StringArray = nodes.iter().map(|n| Some(n.content.as_str())).collect();
        let hashes: StringArray = nodes
            .iter()
            .map(|n| Some(n.content_hash.as_str()))
            .collect();
        let created_ats: UInt64Array = nodes.iter().map(|n| Some(n.created_at)).collect();
        let models: StringArray = nodes.iter().map(|_| Some(model)).collect();

        let metadata = nodes
            .iter()
            .map(|n| serde_json::to_string(&n.metadata).map(Some))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let metadata: StringArray = metadata.into_iter().collect();

        // Build embedding array (FixedSizeList of Float32)
        let embedding_values: Float32Array = embeddings
            .iter()
            .flat_map(|emb| emb.iter().copied())
            .collect();

        let embedding_list = FixedSizeListArray::try_new(
            embedding_item_field(),
            dim as i32,
            Arc::new(embedding_values),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create embedding array: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(doc_ids),
                Arc::new(sources),
                Arc::new(contents),
                Arc::new(metadata),
                Arc::new(hashes),
                Arc::new(created_ats),
                Arc::new(models),
                Arc::new(embedding_list),
            ],
        )
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::{Document, Metadata, SourceKind};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn nodes(count: usize) -> Vec<Node> {
        (0..count)
            .map(|i| {
                let doc = Document::new(SourceKind::Pdf, format!("page {}", i), Metadata::new())
                    .with_metadata("page_label", (i + 1).to_string());
                Node::from_chunk(&doc, doc.text.clone())
            })
            .collect()
    }

    #[test]
    fn test_record_batch_shape() {
        let schema = SchemaManager::get_nodes_schema(4);
        let nodes = nodes(3);
        let embeddings = vec![vec![0.5; 4]; 3];

        let batch =
            BatchInserter::create_record_batch(schema, &nodes, &embeddings, 4, "feature-hash-4")
                .unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 9);
    }

    #[test]
    fn test_record_batch_rejects_mismatched_embeddings() {
        let schema = SchemaManager::get_nodes_schema(4);
        let result = BatchInserter::create_record_batch(schema, &nodes(2), &[vec![0.0; 4]], 4, "m");
        assert!(result.is_err());
    }

    async fn client(dir: &TempDir) -> LanceDbClient {
        LanceDbClient::new(DatabaseConfig {
            uri: dir.path().join("lancedb").display().to_string(),
            pdf_table: "pdf_nodes".to_string(),
            sql_table: "sql_nodes".to_string(),
            batch_size: 2,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_in_batches_and_read_back() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir).await;
        let embedder = EmbeddingClient::offline(16);
        let inserter = BatchInserter::new(&client, &embedder);

        let nodes = nodes(5);
        let stats = inserter.insert_nodes("pdf_nodes", &nodes, None).await.unwrap();

        assert_eq!(stats.nodes_inserted, 5);
        assert_eq!(stats.batches, 3);
        assert_eq!(client.count_rows("pdf_nodes").await.unwrap(), 5);

        let mut stored = client.scan_all("pdf_nodes").await.unwrap();
        stored.sort_by(|a, b| a.metadata["page_label"].cmp(&b.metadata["page_label"]));
        assert_eq!(stored[0].content, "page 0");
        assert_eq!(stored[4].metadata["page_label"], "5");
        assert_eq!(
            client.embedding_model("pdf_nodes").await.unwrap().as_deref(),
            Some("feature-hash-16")
        );
    }

    #[tokio::test]
    async fn test_failed_api_batch_stops_insert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "index": 0, "embedding": [1.0, 0.0, 0.0, 0.0] },
                    { "index": 1, "embedding": [0.0, 1.0, 0.0, 0.0] }
                ]
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let mut llm = crate::config::Config::default_config().llm;
        llm.api_key = Some("sk-test".to_string());
        llm.base_url = server.uri();
        llm.embedding_dim = 4;
        let embedder = EmbeddingClient::new(&llm).unwrap();

        let dir = TempDir::new().unwrap();
        let client = client(&dir).await;
        let result = BatchInserter::new(&client, &embedder)
            .insert_nodes("pdf_nodes", &nodes(4), None)
            .await;

        assert!(matches!(result, Err(RagError::Llm(_))));
        assert_eq!(client.count_rows("pdf_nodes").await.unwrap(), 2);
        assert_eq!(
            client.embedding_model("pdf_nodes").await.unwrap().as_deref(),
            Some("text-embedding-3-small")
        );
    }
}
