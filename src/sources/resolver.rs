// file: src/sources/resolver.rs
// description: Turns a sample or upload selection into validated source paths
// reference: internal acquisition flow

use crate::config::Config;
use crate::error::Result;
use crate::sources::{SampleDownloader, UploadStore};
use crate::utils::Validator;
use crate::utils::validation::{PDF_EXTENSIONS, SQLITE_EXTENSIONS};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    /// Preloaded sample PDF and SQLite database, downloaded on first use.
    Sample,
    /// User-supplied files, staged into the upload directory.
    Upload { pdf: PathBuf, db: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub pdf: PathBuf,
    pub db: PathBuf,
}

impl SourcePaths {
    /// Both files exist and the database carries a SQLite header.
    pub fn validate(&self) -> Result<()> {
        Validator::validate_file_path(&self.pdf)?;
        Validator::validate_file_path(&self.db)?;
        Validator::validate_sqlite_header(&self.db)?;
        Ok(())
    }
}

pub struct SourceResolver {
    config: Config,
}

impl SourceResolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn resolve(&self, selection: &SourceSelection) -> Result<SourcePaths> {
        let paths = match selection {
            SourceSelection::Sample => self.fetch_samples().await?,
            SourceSelection::Upload { pdf, db } => self.stage_uploads(pdf, db)?,
        };

        paths.validate()?;
        info!(
            "Using PDF: {} | Using DB: {}",
            paths.pdf.display(),
            paths.db.display()
        );
        Ok(paths)
    }

    pub async fn fetch_samples(&self) -> Result<SourcePaths> {
        let downloader =
            SampleDownloader::new(Duration::from_secs(self.config.llm.request_timeout_secs))?;

        let pdf = self.config.sample_pdf_path();
        let db = self.config.sample_db_path();

        downloader
            .download_if_missing(&self.config.sources.sample_pdf_url, &pdf)
            .await?;
        downloader
            .download_if_missing(&self.config.sources.sample_db_url, &db)
            .await?;

        Ok(SourcePaths { pdf, db })
    }

    fn stage_uploads(&self, pdf: &Path, db: &Path) -> Result<SourcePaths> {
        let store = UploadStore::new(&self.config.sources.upload_dir);
        Ok(SourcePaths {
            pdf: store.stage(pdf, PDF_EXTENSIONS)?,
            db: store.stage(db, SQLITE_EXTENSIONS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default_config();
        config.sources.sample_dir = dir.to_path_buf();
        config.sources.upload_dir = dir.join("temp");
        config
    }

    fn write_sqlite(path: &Path) {
        rusqlite::Connection::open(path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolve_uploads() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("doc.pdf");
        let db = dir.path().join("data.db");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        write_sqlite(&db);

        let resolver = SourceResolver::new(config_in(dir.path()));
        let paths = resolver
            .resolve(&SourceSelection::Upload { pdf, db })
            .await
            .unwrap();

        assert_eq!(paths.pdf, dir.path().join("temp").join("doc.pdf"));
        assert_eq!(paths.db, dir.path().join("temp").join("data.db"));
    }

    #[tokio::test]
    async fn test_resolve_missing_upload() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let resolver = SourceResolver::new(config_in(dir.path()));
        let result = resolver
            .resolve(&SourceSelection::Upload {
                pdf,
                db: dir.path().join("missing.db"),
            })
            .await;

        assert!(matches!(result, Err(RagError::MissingSource(_))));
    }

    #[tokio::test]
    async fn test_samples_already_present_skip_download() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("example.pdf"), b"%PDF-1.4").unwrap();
        write_sqlite(&dir.path().join("example.db"));

        let mut config = config_in(dir.path());
        config.sources.sample_pdf_url = "http://127.0.0.1:9/example.pdf".to_string();
        config.sources.sample_db_url = "http://127.0.0.1:9/example.db".to_string();

        let paths = SourceResolver::new(config)
            .resolve(&SourceSelection::Sample)
            .await
            .unwrap();
        assert_eq!(paths.db, dir.path().join("example.db"));
    }

    #[test]
    fn test_validate_rejects_non_sqlite_db() {
        let dir = TempDir::new().unwrap();
        let paths = SourcePaths {
            pdf: dir.path().join("a.pdf"),
            db: dir.path().join("b.db"),
        };
        std::fs::write(&paths.pdf, b"%PDF").unwrap();
        std::fs::write(&paths.db, b"plain text").unwrap();

        assert!(matches!(paths.validate(), Err(RagError::Validation(_))));
    }
}
