use crate::pipeline::stats::OccupancyStats;
use crate::web::server::AppState;
use crate::web::upload::{output_name, process_upload, receive_video, ReceiveError};
use axum::{
    body::Body,
    extract::{Multipart, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

#[derive(Serialize)]
pub struct ProcessResponse {
    pub output: String,
    pub video_url: String,
    pub download_url: String,
    pub frames: u64,
    pub stats: OccupancyStats,
    pub processed_at: DateTime<Utc>,
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub async fn process_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let input = match receive_video(&state, multipart).await {
        Ok(path) => path,
        Err(ReceiveError::Rejected(e)) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
        Err(ReceiveError::Malformed(e)) => {
            return json_error(StatusCode::BAD_REQUEST, e.body_text())
        }
        Err(ReceiveError::Internal(e)) => {
            tracing::error!("Failed to store upload: {:#}", e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
    };

    match process_upload(&state, input).await {
        Ok(processed) => {
            let output = output_name(&processed);
            Json(ProcessResponse {
                video_url: format!("/video/{}", output),
                download_url: format!("/download/{}", output),
                output,
                frames: processed.frames,
                stats: processed.stats,
                processed_at: Utc::now(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!("Video processing failed: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

async fn serve_upload_file(
    state: &AppState,
    filename: &str,
    request: Request,
) -> Result<Response, StatusCode> {
    let path = state
        .uploads
        .resolve(filename)
        .ok_or(StatusCode::NOT_FOUND)?;

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}

/// Processed video as an attachment
pub async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, StatusCode> {
    let mut response = serve_upload_file(&state, &filename, request).await?;
    if response.status().is_success() {
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}

/// Processed video for inline playback
pub async fn video_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, StatusCode> {
    let mut response = serve_upload_file(&state, &filename, request).await?;
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    }
    Ok(response)
}
