// file: src/index/router.rs
// description: single-choice routing of a question to the pdf or sql query engine

use crate::error::{RagError, Result};
use crate::index::prompts::single_select_prompt;
use crate::index::{QueryEngine, Response};
use crate::llm::CompletionClient;
use crate::llm::embeddings::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct QueryEngineTool {
    pub name: String,
    pub description: String,
    pub engine: QueryEngine,
}

impl QueryEngineTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, engine: QueryEngine) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine,
        }
    }

    /// Tool named after the engine's source and described by its index contents.
    pub async fn from_engine(engine: QueryEngine) -> Result<Self> {
        let description = engine.index().describe().await?;
        Ok(Self::new(engine.source().as_str(), description, engine))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub index: usize,
    pub tool: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutedResponse {
    pub response: Response,
    pub selection: Selection,
}

#[derive(Debug, Deserialize)]
struct SelectorReply {
    choice: usize,
    #[serde(default)]
    reason: String,
}

pub struct RouterQueryEngine {
    tools: Vec<QueryEngineTool>,
    llm: CompletionClient,
}

impl RouterQueryEngine {
    pub fn new(tools: Vec<QueryEngineTool>, llm: CompletionClient) -> Result<Self> {
        if tools.is_empty() {
            return Err(RagError::Validation(
                "Router needs at least one query engine".to_string(),
            ));
        }
        Ok(Self { tools, llm })
    }

    pub async fn select(&self, question: &str) -> Selection {
        if self.tools.len() == 1 {
            return self.selection(0, "only one index available".to_string());
        }

        if self.llm.is_configured() {
            let descriptions: Vec<&str> = self.tools.iter().map(|t| t.description.as_str()).collect();
            let prompt = single_select_prompt(&descriptions, question);

            match self.llm.complete(&prompt).await {
                Ok(reply) => match parse_selection(&reply, self.tools.len()) {
                    Some((index, reason)) => return self.selection(index, reason),
                    None => warn!("Could not parse selector reply: {}", reply),
                },
                Err(e) => warn!("Selector call failed: {}. Falling back to term overlap.", e),
            }
        }

        let descriptions: Vec<&str> = self.tools.iter().map(|t| t.description.as_str()).collect();
        let (index, overlap) = lexical_select(question, &descriptions);
        let reason = if overlap == 0 {
            "no question terms matched any index; using the first".to_string()
        } else {
            format!("{} question terms matched its description", overlap)
        };

        self.selection(index, reason)
    }

    pub async fn query(&self, question: &str) -> Result<RoutedResponse> {
        let selection = self.select(question).await;
        info!("Routing question to {} ({})", selection.tool, selection.reason);

        let response = self.tools[selection.index].engine.query(question).await?;
        Ok(RoutedResponse {
            response,
            selection,
        })
    }

    fn selection(&self, index: usize, reason: String) -> Selection {
        Selection {
            index,
            tool: self.tools[index].name.clone(),
            reason,
        }
    }
}

/// Zero-based choice and reason from a selector reply, either the requested
/// JSON object or a bare number.
fn parse_selection(reply: &str, choices: usize) -> Option<(usize, String)> {
    let in_range = |choice: usize| (1..=choices).contains(&choice);

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}'))
        && start < end
        && let Ok(parsed) = serde_json::from_str::<SelectorReply>(&reply[start..=end])
        && in_range(parsed.choice)
    {
        return Some((parsed.choice - 1, parsed.reason));
    }

    reply
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|token| token.parse::<usize>().ok())
        .find(|&choice| in_range(choice))
        .map(|choice| (choice - 1, "selected by model".to_string()))
}

/// Index of the description sharing the most terms with the question, and
/// that overlap. Ties go to the earlier description.
fn lexical_select(question: &str, descriptions: &[&str]) -> (usize, usize) {
    let terms: HashSet<String> = tokenize(question).filter(|t| t.len() > 2).collect();

    let mut best = (0, 0);
    for (index, description) in descriptions.iter().enumerate() {
        let vocabulary: HashSet<String> = tokenize(description).collect();
        let overlap = terms.intersection(&vocabulary).count();
        debug!("Router overlap for choice {}: {}", index + 1, overlap);

        if overlap > best.1 {
            best = (index, overlap);
        }
    }

    best
}
