// file: src/sources/mod.rs
// description: source file acquisition module exports
// reference: internal module structure

pub mod download;
pub mod resolver;
pub mod upload;

pub use download::SampleDownloader;
pub use resolver::{SourcePaths, SourceResolver, SourceSelection};
pub use upload::UploadStore;
