// file: src/llm/completion.rs
// description: OpenAI-compatible chat completion client
// reference: https://platform.openai.com/docs/api-reference/chat

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }

    /// Client without credentials; `complete` always fails.
    pub fn unconfigured() -> Self {
        Self {
            client: Client::new(),
            api_key: None,
            base_url: String::new(),
            model: String::new(),
            temperature: 0.0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Llm("No API key configured".to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!("Requesting completion from {} ({} chars)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Llm(format!("Failed to send completion request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Llm(format!(
                "Completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Llm(format!("Failed to parse completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::Llm("Completion response had no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_client_errors() {
        let client = CompletionClient::unconfigured();
        assert!(!client.is_configured());
        assert!(matches!(
            tokio_test::block_on(client.complete("hi")),
            Err(RagError::Llm(_))
        ));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":" 42 "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" 42 "));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            temperature: 0.1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
