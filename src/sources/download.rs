// file: src/sources/download.rs
// description: Sample file download with skip-if-present semantics
// reference: https://docs.rs/reqwest

use crate::error::{RagError, Result};
use crate::utils::Validator;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub struct SampleDownloader {
    client: Client,
}

impl SampleDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Downloads `url` to `local_path` unless the file is already there.
    ///
    /// Returns `true` when a download happened. A failed transfer leaves
    /// nothing at `local_path`.
    pub async fn download_if_missing(&self, url: &str, local_path: &Path) -> Result<bool> {
        if local_path.exists() {
            debug!("{} already present, skipping download", local_path.display());
            return Ok(false);
        }

        Validator::validate_url(url)?;
        info!("Downloading {} -> {}", url, local_path.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RagError::Download {
                url: url.to_string(),
                message: format!("server returned {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RagError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if let Some(parent) = local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RagError::file_operation(parent, e))?;
        }

        let partial = partial_path(local_path);
        let written = match tokio::fs::write(&partial, &bytes).await {
            Ok(()) => tokio::fs::rename(&partial, local_path)
                .await
                .map_err(|e| RagError::file_operation(local_path, e)),
            Err(e) => Err(RagError::file_operation(&partial, e)),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                debug!("Could not remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }

        info!("Saved {} bytes to {}", bytes.len(), local_path.display());
        Ok(true)
    }
}

/// `example.pdf` downloads through `example.pdf.part`.
fn partial_path(local_path: &Path) -> PathBuf {
    let mut partial = local_path.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}
