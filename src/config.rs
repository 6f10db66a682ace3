// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{RagError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SAMPLE_PDF_URL: &str =
    "https://raw.githubusercontent.com/instrovate/ragforsql-pdf/main/example.pdf";
pub const SAMPLE_DB_URL: &str =
    "https://raw.githubusercontent.com/instrovate/ragforsql-pdf/main/example.db";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sources: SourcesConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    pub sample_pdf_url: String,
    pub sample_db_url: String,
    pub sample_dir: PathBuf,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub pdf_table: String,
    pub sql_table: String,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_top_k: usize,
    pub max_rows_per_table: usize,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| RagError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(
                config::File::from(Path::new("config/default.toml")).required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RAGFORSQL")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            sources: SourcesConfig {
                sample_pdf_url: SAMPLE_PDF_URL.to_string(),
                sample_db_url: SAMPLE_DB_URL.to_string(),
                sample_dir: PathBuf::from("."),
                upload_dir: PathBuf::from("temp"),
            },
            database: DatabaseConfig {
                uri: "data/lancedb".to_string(),
                pdf_table: "pdf_index".to_string(),
                sql_table: "sql_index".to_string(),
                batch_size: 64,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                embedding_dim: 1536,
                temperature: 0.1,
                request_timeout_secs: 60,
            },
            index: IndexConfig {
                chunk_size: 1024,
                chunk_overlap: 200,
                similarity_top_k: 2,
                max_rows_per_table: 1000,
            },
        }
    }

    pub fn sample_pdf_path(&self) -> PathBuf {
        self.sources.sample_dir.join("example.pdf")
    }

    pub fn sample_db_path(&self) -> PathBuf {
        self.sources.sample_dir.join("example.db")
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.batch_size == 0 {
            return Err(RagError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.llm.embedding_dim == 0 {
            return Err(RagError::Config(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }

        if self.index.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }

        if self.index.similarity_top_k == 0 {
            return Err(RagError::Config(
                "similarity_top_k must be greater than 0".to_string(),
            ));
        }

        if self.database.pdf_table == self.database.sql_table {
            return Err(RagError::Config(
                "pdf_table and sql_table must differ".to_string(),
            ));
        }

        Ok(())
    }
}
