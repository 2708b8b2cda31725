use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons an upload is turned away before any processing happens.
/// The message is shown to the user as-is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file part")]
    MissingFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file name")]
    InvalidFileName,
}

/// Reduces a client-supplied file name to a safe base name.
///
/// Path components are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9._-]` is removed. Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The directory uploads are saved to and processed videos are written to.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        tracing::info!("Using upload directory {:?}", root);
        Ok(Self { root })
    }

    /// Where an upload with the given client file name is stored.
    pub fn upload_path(&self, client_name: &str) -> Result<PathBuf, UploadError> {
        if client_name.trim().is_empty() {
            return Err(UploadError::NoSelectedFile);
        }
        let name = sanitize_filename(client_name).ok_or(UploadError::InvalidFileName)?;
        Ok(self.root.join(name))
    }

    /// Resolves a file name from a download URL to an existing file in the directory.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if sanitize_filename(filename).as_deref() != Some(filename) {
            return None;
        }
        let path = self.root.join(filename);
        path.is_file().then_some(path)
    }
}
