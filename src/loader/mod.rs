// file: src/loader/mod.rs
// description: document loading and chunking module exports
// reference: internal module structure

pub mod chunker;
pub mod normalizer;
pub mod pdf;
pub mod sql;

pub use chunker::TextChunker;
pub use normalizer::TextNormalizer;
pub use pdf::PdfLoader;
pub use sql::{SqlDatabaseReader, TableSummary};
