// file: src/loader/chunker.rs
// description: Overlapping fixed-size text chunking on word boundaries

use crate::config::IndexConfig;
use crate::models::{Document, Node};

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Splits `text` into chunks of at most `chunk_size` characters.
    ///
    /// Chunks end on whitespace unless a single word is longer than the
    /// remaining window. Consecutive chunks share up to `chunk_overlap`
    /// characters, rounded to whole words.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        if len <= self.chunk_size {
            return vec![text.trim().to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(len);
            let end = if hard_end == len {
                len
            } else {
                (start + 1..hard_end)
                    .rev()
                    .find(|&i| chars[i].is_whitespace())
                    .filter(|&i| i > start + self.chunk_overlap)
                    .unwrap_or(hard_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= len {
                break;
            }

            let mut next = end.saturating_sub(self.chunk_overlap).max(start + 1);
            if !chars[next - 1].is_whitespace() {
                next = (next..end)
                    .find(|&i| chars[i].is_whitespace())
                    .map(|i| i + 1)
                    .unwrap_or(end);
            }
            start = next;
        }

        chunks
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<Node> {
        documents
            .iter()
            .flat_map(|document| {
                self.split(&document.text)
                    .into_iter()
                    .map(move |chunk| Node::from_chunk(document, chunk))
            })
            .collect()
    }
}
