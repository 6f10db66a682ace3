// file: src/utils/validation.rs
// description: input validation for source files, urls and questions
// reference: input validation patterns

use crate::error::{RagError, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const SQLITE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

pub struct Validator;

impl Validator {
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(RagError::MissingSource(path.to_path_buf()));
        }

        let canonical = fs::canonicalize(path).map_err(|e| {
            RagError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(RagError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_extension(path: &Path, allowed: &[&str]) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension {
            Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
            _ => Err(RagError::Validation(format!(
                "{} must have one of the extensions: {}",
                path.display(),
                allowed.join(", ")
            ))),
        }
    }

    /// Checks the 16-byte header every SQLite 3 database starts with.
    pub fn validate_sqlite_header(path: &Path) -> Result<()> {
        let mut header = [0u8; 16];
        let mut file = fs::File::open(path).map_err(|e| RagError::file_operation(path, e))?;

        if file.read_exact(&mut header).is_err() || &header != SQLITE_MAGIC {
            return Err(RagError::Validation(format!(
                "{} is not a SQLite database",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_question(question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(RagError::Validation("Question is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RagError::Validation(format!(
                "Invalid URL format: {}",
                url
            )));
        }
        Ok(())
    }

    pub fn truncate_text(text: &str, max_length: usize) -> String {
        match text.char_indices().nth(max_length) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_validate_extension() {
        assert!(Validator::validate_extension(Path::new("a.PDF"), PDF_EXTENSIONS).is_ok());
        assert!(Validator::validate_extension(Path::new("a.db"), SQLITE_EXTENSIONS).is_ok());
        assert!(Validator::validate_extension(Path::new("a.txt"), PDF_EXTENSIONS).is_err());
        assert!(Validator::validate_extension(Path::new("noext"), SQLITE_EXTENSIONS).is_err());
    }

    #[test]
    fn test_missing_file_is_missing_source() {
        let result = Validator::validate_file_path(Path::new("/definitely/not/here.pdf"));
        assert!(matches!(result, Err(RagError::MissingSource(_))));
    }

    #[test]
    fn test_sqlite_header() {
        let dir = TempDir::new().unwrap();

        let db_path = dir.path().join("real.db");
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();
        assert!(Validator::validate_sqlite_header(&db_path).is_ok());

        let fake = dir.path().join("fake.db");
        fs::File::create(&fake)
            .unwrap()
            .write_all(b"not a database")
            .unwrap();
        assert!(Validator::validate_sqlite_header(&fake).is_err());
    }

    #[test]
    fn test_validate_question() {
        assert!(Validator::validate_question("what is in the pdf?").is_ok());
        assert!(Validator::validate_question("   ").is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(Validator::truncate_text("a longer text", 8), "a longer...");
    }
}
