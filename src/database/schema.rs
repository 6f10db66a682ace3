// file: src/database/schema.rs
// description: LanceDB schema management for the pdf and sql node tables
// reference: https://docs.rs/lancedb

use crate::database::client::LanceDbClient;
use crate::error::Result;
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchemaManager<'a> {
    client: &'a LanceDbClient,
}

impl<'a> SchemaManager<'a> {
    pub fn new(client: &'a LanceDbClient) -> Self {
        Self { client }
    }

    /// Both index tables exist.
    pub async fn verify_schema(&self) -> Result<bool> {
        let mut complete = true;

        for table_name in self.client.index_tables() {
            if self.client.table_exists(table_name).await? {
                info!("Table '{}' exists", table_name);
            } else {
                warn!("Table '{}' does not exist", table_name);
                complete = false;
            }
        }

        Ok(complete)
    }

    /// Returns the Arrow schema shared by the index tables
    pub fn get_nodes_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            // JSON-encoded key/value metadata
            Field::new("metadata", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("created_at", DataType::UInt64, false),
            Field::new("embedding_model", DataType::Utf8, false),
            Field::new("embedding", embedding_type(embedding_dim), false),
        ]))
    }

    pub async fn drop_all_tables(&self) -> Result<()> {
        warn!("Dropping all index tables in LanceDB");

        for table_name in self.client.index_tables() {
            if self.client.drop_table(table_name).await? {
                info!("Dropped table: {}", table_name);
            }
        }

        Ok(())
    }
}

pub(crate) fn embedding_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

fn embedding_type(embedding_dim: usize) -> DataType {
    DataType::FixedSizeList(embedding_item_field(), embedding_dim as i32)
}
