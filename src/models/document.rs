// file: src/models/document.rs
// description: source documents and the chunked nodes stored in an index
// reference: internal data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Sql,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Sql => "sql",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceKind::Pdf),
            "sql" | "db" => Ok(SourceKind::Sql),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of text loaded from a PDF page or a SQLite table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: SourceKind,
    pub text: String,
    pub metadata: Metadata,
    pub content_hash: String,
}

impl Document {
    pub fn new(source: SourceKind, text: String, metadata: Metadata) -> Self {
        let content_hash = compute_hash(&text);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            text,
            metadata,
            content_hash,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A chunk of a [`Document`], the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub doc_id: String,
    pub source: SourceKind,
    pub content: String,
    pub metadata: Metadata,
    pub content_hash: String,
    pub created_at: u64,
}

impl Node {
    pub fn from_chunk(document: &Document, content: String) -> Self {
        let content_hash = compute_hash(&content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            doc_id: document.id.clone(),
            source: document.source,
            content,
            metadata: document.metadata.clone(),
            content_hash,
            created_at: unix_now(),
        }
    }

    /// Text handed to the embedding model: metadata header followed by content.
    pub fn embedding_text(&self) -> String {
        if self.metadata.is_empty() {
            return self.content.clone();
        }

        let header = self
            .metadata
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\n{}", header, self.content)
    }
}

pub(crate) fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
