// file: src/exporter/mod.rs
// description: index export module exports
// reference: internal module structure

pub mod json;

pub use json::{ExportManifest, ExportedTable, JsonExporter};
