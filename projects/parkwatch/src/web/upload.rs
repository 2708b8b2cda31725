use crate::pipeline::processor::process_video;
use crate::pipeline::types::ProcessedVideo;
use crate::uploads::UploadError;
use crate::web::server::AppState;
use anyhow::Context;
use axum::extract::multipart::{Multipart, MultipartError};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

pub enum ReceiveError {
    Rejected(UploadError),
    Malformed(MultipartError),
    Internal(anyhow::Error),
}

impl From<UploadError> for ReceiveError {
    fn from(e: UploadError) -> Self {
        ReceiveError::Rejected(e)
    }
}

impl From<MultipartError> for ReceiveError {
    fn from(e: MultipartError) -> Self {
        ReceiveError::Malformed(e)
    }
}

/// Streams the `video` part of a multipart form into the upload directory.
pub async fn receive_video(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<PathBuf, ReceiveError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("video") {
            continue;
        }

        let client_name = field.file_name().unwrap_or("").to_string();
        let path = state.uploads.upload_path(&client_name)?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create upload file {:?}", path))
            .map_err(ReceiveError::Internal)?;
        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write upload file {:?}", path))
                .map_err(ReceiveError::Internal)?;
            written += chunk.len();
        }
        file.flush()
            .await
            .context("Failed to flush upload file")
            .map_err(ReceiveError::Internal)?;

        tracing::info!("Saved upload {:?} ({} bytes)", path, written);
        return Ok(path);
    }

    Err(UploadError::MissingFilePart.into())
}

/// Runs the pipeline on a blocking thread so the runtime keeps serving requests.
pub async fn process_upload(state: &AppState, input: PathBuf) -> anyhow::Result<ProcessedVideo> {
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || process_video(&input, &config))
        .await
        .context("Video processing task panicked")?
}

/// File name of a processed video as it appears in URLs
pub fn output_name(processed: &ProcessedVideo) -> String {
    processed
        .output_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
