use crate::cli::Args;
use crate::pipeline::types::PipelineConfig;
use crate::uploads::UploadDir;
use crate::web::api::{download_handler, process_handler, video_handler};
use crate::web::assets::static_handler;
use crate::web::pages::{index_handler, upload_handler};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub uploads: UploadDir,
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler).post(upload_handler))
        .route("/api/process", post(process_handler))
        .route("/download/:filename", get(download_handler))
        .route("/video/:filename", get(video_handler))
        .route("/static/*path", get(static_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(args: Args) -> Result<()> {
    let config = PipelineConfig::from_args(&args)?;
    let uploads = UploadDir::new(config.output_dir.clone())?;
    info!(
        "Model {:?}, layout {:?}, min_conf={}",
        config.occupancy.model_path, config.occupancy.layout_path, config.occupancy.min_conf
    );
    let state = AppState {
        config: Arc::new(config),
        uploads,
    };

    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Tokio requires a non-blocking socket
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port
                    .checked_add(1)
                    .ok_or_else(|| anyhow::anyhow!("No available ports found"))?;
            }
        }
    };

    let app = build_router(state, args.max_upload_mb.saturating_mul(1024 * 1024));

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Parkwatch server started on http://{}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::OccupancyConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use indicatif::{MultiProgress, ProgressDrawTarget};
    use std::path::{Path, PathBuf};
    use tower::ServiceExt;

    const BOUNDARY: &str = "parkwatch-test-boundary";

    fn app(dir: &Path) -> Router {
        let state = AppState {
            config: Arc::new(PipelineConfig {
                output_dir: dir.to_path_buf(),
                fourcc: ['m', 'p', '4', 'v'],
                reject_empty_input: false,
                occupancy: OccupancyConfig {
                    model_path: PathBuf::from("/nonexistent/model.onnx"),
                    layout_path: PathBuf::from("/nonexistent/layout.json"),
                    min_conf: 0.25,
                    classes: Vec::new(),
                    class_names: Vec::new(),
                },
                progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            }),
            uploads: UploadDir::new(dir.to_path_buf()).unwrap(),
        };
        build_router(state, 16 * 1024 * 1024)
    }

    fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("enctype=\"multipart/form-data\""));
        assert!(!page.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_upload_without_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request("/", &[("note", None, "hello")]);
        let response = app(dir.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("No file part"));
        assert!(!page.contains("<video"));
    }

    #[tokio::test]
    async fn test_upload_with_no_selected_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request("/", &[("video", Some(""), "")]);
        let response = app(dir.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("No selected file"));
        // Nothing was stored or processed
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_api_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request("/api/process", &[("note", None, "hello")]);
        let response = app(dir.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "No file part");
    }

    #[tokio::test]
    async fn test_undecodable_upload_still_reports_broken_layout() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(
            "/api/process",
            &[("video", Some("garbage.mp4"), "definitely not a video")],
        );
        let response = app(dir.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("parking layout"));
        assert!(dir.path().join("garbage.mp4").exists());
        assert!(!dir.path().join("output_garbage.mp4").exists());
    }

    #[tokio::test]
    async fn test_download_and_video_routes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("output_lot.mp4"), b"fake video bytes").unwrap();

        let response = app(dir.path())
            .oneshot(
                Request::get("/download/output_lot.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"output_lot.mp4\""
        );
        assert_eq!(body_text(response).await, "fake video bytes");

        let response = app(dir.path())
            .oneshot(
                Request::get("/video/output_lot.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn test_missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        for uri in ["/download/nope.mp4", "/video/nope.mp4", "/download/..%2Fetc"] {
            let response = app(dir.path())
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_static_assets() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/static/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
