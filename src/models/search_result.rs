// file: src/models/search_result.rs
// description: Search result model with similarity scores
// reference: Used for vector similarity search results

use crate::models::document::{Metadata, SourceKind};
use crate::utils::Validator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Node ID
    pub id: String,

    /// ID of the document the node was chunked from
    pub doc_id: String,

    pub source: SourceKind,

    /// Node content
    pub content: String,

    pub metadata: Metadata,

    /// Similarity score (higher is more similar, typically 0.0-1.0)
    pub score: f32,

    /// Optional: Distance metric (lower is more similar)
    pub distance: Option<f32>,
}

impl SearchResult {
    /// Format as a summary string for display
    pub fn format_summary(&self, max_content_len: usize) -> String {
        let content_preview = Validator::truncate_text(&self.content, max_content_len);

        format!(
            "Score: {:.4} | {} ({})\n{}\n",
            self.score,
            self.source,
            self.location(),
            content_preview
        )
    }

    /// Human-readable pointer back into the source: a page or a table row.
    pub fn location(&self) -> String {
        if let Some(page) = self.metadata.get("page_label") {
            return format!("page {}", page);
        }

        match (self.metadata.get("table"), self.metadata.get("row")) {
            (Some(table), Some(row)) => format!("{} row {}", table, row),
            (Some(table), None) => format!("{} schema", table),
            _ => "unknown".to_string(),
        }
    }
}
