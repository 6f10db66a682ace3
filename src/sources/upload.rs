// file: src/sources/upload.rs
// description: Staging of user-supplied files into the upload directory

use crate::error::{RagError, Result};
use crate::utils::Validator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct UploadStore {
    upload_dir: PathBuf,
}

impl UploadStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Copies `file` into the upload directory under its own file name.
    ///
    /// A file that already lives in the upload directory is returned as-is.
    pub fn stage(&self, file: &Path, allowed_extensions: &[&str]) -> Result<PathBuf> {
        Validator::validate_file_path(file)?;
        Validator::validate_extension(file, allowed_extensions)?;

        fs::create_dir_all(&self.upload_dir)
            .map_err(|e| RagError::file_operation(&self.upload_dir, e))?;

        let file_name = file.file_name().ok_or_else(|| {
            RagError::Validation(format!("{} has no file name", file.display()))
        })?;
        let target = self.upload_dir.join(file_name);

        if is_same_file(file, &target) {
            return Ok(target);
        }

        fs::copy(file, &target).map_err(|e| RagError::file_operation(&target, e))?;
        info!("Staged {} as {}", file.display(), target.display());

        Ok(target)
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
