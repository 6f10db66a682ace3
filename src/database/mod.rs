// file: src/database/mod.rs
// description: LanceDB vector store module exports
// reference: internal module structure

pub mod client;
pub mod insert;
pub mod schema;

pub use client::LanceDbClient;
pub use insert::{BatchInserter, InsertStats};
pub use schema::SchemaManager;
