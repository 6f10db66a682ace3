// file: src/index/vector_index.rs
// description: LanceDB-backed vector index over the nodes of one source
// reference: https://docs.rs/lancedb

use crate::database::{BatchInserter, LanceDbClient};
use crate::error::{RagError, Result};
use crate::index::QueryEngine;
use crate::llm::{CompletionClient, EmbeddingClient};
use crate::loader::TextChunker;
use crate::models::{Document, Node, SearchResult, SourceKind};
use crate::pipeline::ProgressTracker;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Clone)]
pub struct VectorStoreIndex {
    client: LanceDbClient,
    embedder: EmbeddingClient,
    source: SourceKind,
    table: String,
}

impl VectorStoreIndex {
    /// Chunks, embeds and stores `documents`, replacing any earlier index of
    /// the same source.
    pub async fn from_documents(
        client: &LanceDbClient,
        embedder: &EmbeddingClient,
        source: SourceKind,
        documents: &[Document],
        chunker: &TextChunker,
        progress: Option<&ProgressTracker>,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(RagError::Validation(format!(
                "No {} documents to index",
                source
            )));
        }

        let nodes = chunker.split_documents(documents);
        if let Some(progress) = progress {
            progress.add_documents(documents.len());
        }

        Self::from_nodes(client, embedder, source, &nodes, progress).await
    }

    pub async fn from_nodes(
        client: &LanceDbClient,
        embedder: &EmbeddingClient,
        source: SourceKind,
        nodes: &[Node],
        progress: Option<&ProgressTracker>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(RagError::Validation(format!("No {} nodes to index", source)));
        }

        let table = client.table_for(source).to_string();
        if client.drop_table(&table).await? {
            info!("Replaced previous {} index", source);
        }

        let stats = BatchInserter::new(client, embedder)
            .insert_nodes(&table, nodes, progress)
            .await?;
        info!(
            "Built {} index: {} nodes in {} batches",
            source, stats.nodes_inserted, stats.batches
        );

        Ok(Self {
            client: client.clone(),
            embedder: embedder.clone(),
            source,
            table,
        })
    }

    /// Reopens a persisted index; `None` when it was never built.
    ///
    /// Fails when the stored vectors come from a different embedding model
    /// than `embedder`, since queries would be compared across vector spaces.
    pub async fn open(
        client: &LanceDbClient,
        embedder: &EmbeddingClient,
        source: SourceKind,
    ) -> Result<Option<Self>> {
        let table = client.table_for(source).to_string();
        if !client.table_exists(&table).await? {
            return Ok(None);
        }

        let expected = embedder.model_id();
        let stored = client.embedding_model(&table).await?;
        if let Some(stored) = stored.filter(|stored| *stored != expected) {
            return Err(RagError::Validation(format!(
                "The {} index was embedded with '{}' but the current model is '{}'; \
                 run `ragforsql index` again",
                source, stored, expected
            )));
        }

        Ok(Some(Self {
            client: client.clone(),
            embedder: embedder.clone(),
            source,
            table,
        }))
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub async fn node_count(&self) -> Result<u64> {
        self.client.count_rows(&self.table).await
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed(query).await?;
        self.client
            .vector_search(&self.table, embedding, top_k)
            .await
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.client.scan_all(&self.table).await
    }

    /// Routing description built from what the index actually holds.
    pub async fn describe(&self) -> Result<String> {
        let nodes = self.nodes().await?;

        let description = match self.source {
            SourceKind::Pdf => {
                let files: BTreeSet<&str> = nodes
                    .iter()
                    .filter_map(|n| n.metadata.get("file_name").map(String::as_str))
                    .collect();
                format!(
                    "Useful for questions about the text of the PDF document {} \
                     ({} passages): what the document, report or pages say.",
                    files.into_iter().collect::<Vec<_>>().join(", "),
                    nodes.len()
                )
            }
            SourceKind::Sql => {
                let schemas: BTreeSet<&str> = nodes
                    .iter()
                    .filter(|n| !n.metadata.contains_key("row"))
                    .map(|n| n.content.as_str())
                    .collect();
                format!(
                    "Useful for questions about records, rows, counts and values stored in \
                     the SQLite database. {}",
                    schemas.into_iter().collect::<Vec<_>>().join(" ")
                )
            }
        };

        Ok(description)
    }

    pub fn as_query_engine(&self, llm: &CompletionClient, top_k: usize) -> QueryEngine {
        QueryEngine::new(self.clone(), llm.clone(), top_k)
    }
}
