// file: src/index/query_engine.rs
// description: retrieve-then-synthesize query engine over one vector index

use crate::error::Result;
use crate::index::VectorStoreIndex;
use crate::index::prompts::{build_context, text_qa_prompt};
use crate::llm::CompletionClient;
use crate::models::{SearchResult, SourceKind};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

pub const EMPTY_RESPONSE: &str = "Empty Response";

const OFFLINE_NOTE: &str = "No LLM configured; the most relevant passages are:";

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub source: SourceKind,
    pub text: String,
    pub source_nodes: Vec<SearchResult>,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    index: VectorStoreIndex,
    llm: CompletionClient,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: VectorStoreIndex, llm: CompletionClient, top_k: usize) -> Self {
        Self {
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    pub fn source(&self) -> SourceKind {
        self.index.source()
    }

    pub fn index(&self) -> &VectorStoreIndex {
        &self.index
    }

    pub async fn query(&self, question: &str) -> Result<Response> {
        let source_nodes = self.index.retrieve(question, self.top_k).await?;
        debug!(
            "Retrieved {} nodes from {} index",
            source_nodes.len(),
            self.source()
        );

        let text = self.synthesize(question, &source_nodes).await?;

        Ok(Response {
            source: self.source(),
            text,
            source_nodes,
        })
    }

    async fn synthesize(&self, question: &str, nodes: &[SearchResult]) -> Result<String> {
        if nodes.is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }

        if !self.llm.is_configured() {
            return Ok(extractive_answer(nodes));
        }

        let prompt = text_qa_prompt(&build_context(nodes), question);
        info!("Asking {} about the {} index", self.llm.model(), self.source());
        self.llm.complete(&prompt).await
    }
}

fn extractive_answer(nodes: &[SearchResult]) -> String {
    let mut answer = String::from(OFFLINE_NOTE);
    for node in nodes {
        answer.push_str(&format!("\n[{}] {}", node.location(), node.content));
    }
    answer
}
