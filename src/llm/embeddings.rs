// file: src/llm/embeddings.rs
// description: OpenAI-compatible embeddings with a deterministic offline fallback
// reference: https://platform.openai.com/docs/api-reference/embeddings

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dim: usize,
}

impl EmbeddingClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            warn!("No API key configured - using offline fallback embeddings");
        }

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dim: config.embedding_dim,
        })
    }

    /// Client that never calls out; every vector is a fallback embedding.
    pub fn offline(dim: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: None,
            base_url: String::new(),
            model: String::new(),
            dim,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn is_remote(&self) -> bool {
        self.api_key.is_some()
    }

    /// Name of the vector space this client produces, stored with every node.
    pub fn model_id(&self) -> String {
        if self.is_remote() {
            self.model.clone()
        } else {
            format!("feature-hash-{}", self.dim)
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Llm("No embedding returned".to_string()))
    }

    /// Embeds `texts` in one request.
    ///
    /// Without an API key every vector is a hashed embedding. With a key,
    /// API failures and wrong dimensions are errors so one table never mixes
    /// the two vector spaces.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let Some(api_key) = &self.api_key else {
            return Ok(self.fallback_batch(texts));
        };

        let embeddings = self.request_embeddings(api_key, texts).await?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dim) {
            return Err(RagError::Llm(format!(
                "Embedding API returned dimension {}, expected {}",
                bad.len(),
                self.dim
            )));
        }

        debug!("Generated {} API embeddings", embeddings.len());
        Ok(embeddings)
    }

    async fn request_embeddings(&self, api_key: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        debug!("Requesting {} embeddings from {}", texts.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Llm(format!("Failed to send embedding request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Llm(format!(
                "Embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Llm(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::Llm(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn fallback_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| Self::generate_fallback_embedding(text, self.dim))
            .collect()
    }

    /// Feature-hashed bag of words, L2-normalized.
    ///
    /// Texts sharing vocabulary land close together.
    pub fn generate_fallback_embedding(text: &str, dim: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dim];
        if dim == 0 {
            return vector;
        }

        for token in tokenize(text) {
            let slot = (fnv1a(token.as_bytes()) % dim as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

/// Lowercased alphanumeric tokens.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(0x100000001b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_fallback_embedding_shape() {
        let embedding = EmbeddingClient::generate_fallback_embedding("test text", 384);
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fallback_embedding_deterministic() {
        let emb1 = EmbeddingClient::generate_fallback_embedding("same text", 128);
        let emb2 = EmbeddingClient::generate_fallback_embedding("same text", 128);
        assert_eq!(emb1, emb2);
    }

    #[test]
    fn test_fallback_embedding_is_lexical() {
        let query = EmbeddingClient::generate_fallback_embedding("employee salary", 4096);
        let related =
            EmbeddingClient::generate_fallback_embedding("name: Ada, salary: 120000", 4096);
        let unrelated =
            EmbeddingClient::generate_fallback_embedding("photosynthesis in plants", 4096);

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = EmbeddingClient::generate_fallback_embedding("  ", 16);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_offline_client_batches() {
        let client = EmbeddingClient::offline(64);
        let embeddings = client
            .embed_batch(&["a b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert!(!client.is_remote());
        assert_eq!(
            client.embed("c").await.unwrap(),
            EmbeddingClient::generate_fallback_embedding("c", 64)
        );
    }

    fn remote_config(base_url: &str, dim: usize) -> LlmConfig {
        let mut config = crate::config::Config::default_config().llm;
        config.api_key = Some("sk-test".to_string());
        config.base_url = base_url.to_string();
        config.embedding_dim = dim;
        config.request_timeout_secs = 2;
        config
    }

    #[test]
    fn test_model_id_names_vector_space() {
        assert_eq!(EmbeddingClient::offline(64).model_id(), "feature-hash-64");

        let client = EmbeddingClient::new(&remote_config("http://127.0.0.1:9/v1", 8)).unwrap();
        assert!(client.is_remote());
        assert_eq!(client.model_id(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_an_error() {
        let client = EmbeddingClient::new(&remote_config("http://127.0.0.1:9/v1", 32)).unwrap();
        assert!(matches!(client.embed("hello").await, Err(RagError::Llm(_))));
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "index": 0, "embedding": [0.1, 0.2] }]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new(&remote_config(&server.uri(), 4)).unwrap();
        assert!(matches!(client.embed("hello").await, Err(RagError::Llm(_))));
    }
}
