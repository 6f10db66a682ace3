// file: src/index/mod.rs
// description: vector indexes, query engines and pdf/sql routing
// reference: internal module structure

pub mod prompts;
pub mod query_engine;
pub mod router;
pub mod vector_index;

pub use query_engine::{EMPTY_RESPONSE, QueryEngine, Response};
pub use router::{QueryEngineTool, RouterQueryEngine, RoutedResponse, Selection};
pub use vector_index::VectorStoreIndex;
