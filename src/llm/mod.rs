// file: src/llm/mod.rs
// description: OpenAI-compatible embedding and chat completion clients
// reference: internal module structure

pub mod completion;
pub mod embeddings;

pub use completion::CompletionClient;
pub use embeddings::EmbeddingClient;
