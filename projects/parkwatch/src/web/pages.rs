use crate::pipeline::types::ProcessedVideo;
use crate::web::assets::template;
use crate::web::server::AppState;
use crate::web::upload::{output_name, process_upload, receive_video, ReceiveError};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
};

type PageResult = Result<Html<String>, (StatusCode, String)>;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_result(processed: &ProcessedVideo) -> String {
    let name = escape_html(&output_name(processed));
    let stats = &processed.stats;
    format!(
        r#"<section class="result">
      <h2>Results</h2>
      <table class="stats">
        <tr><th>Total slots</th><td>{}</td></tr>
        <tr><th>Available slots</th><td>{}</td></tr>
        <tr><th>Occupied slots</th><td>{}</td></tr>
        <tr><th>Frames analyzed</th><td>{}</td></tr>
      </table>
      <video controls src="/video/{name}"></video>
      <p><a href="/download/{name}">Download processed video</a></p>
    </section>"#,
        stats.total_slots, stats.available_slots, stats.occupied_slots, processed.frames,
    )
}

/// Fills the index template. `error` is user-facing text and gets escaped.
pub fn render_index(error: Option<&str>, processed: Option<&ProcessedVideo>) -> PageResult {
    let page = template("index.html").ok_or_else(|| {
        tracing::error!("index.html template missing from embedded assets");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Page template missing".to_string(),
        )
    })?;

    let error_html = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape_html(e)))
        .unwrap_or_default();
    let result_html = processed.map(render_result).unwrap_or_default();

    Ok(Html(
        page.replace("{{error}}", &error_html)
            .replace("{{result}}", &result_html),
    ))
}

pub async fn index_handler() -> PageResult {
    render_index(None, None)
}

pub async fn upload_handler(State(state): State<AppState>, multipart: Multipart) -> PageResult {
    let input = match receive_video(&state, multipart).await {
        Ok(path) => path,
        Err(ReceiveError::Rejected(e)) => {
            tracing::info!("Upload rejected: {}", e);
            return render_index(Some(&e.to_string()), None);
        }
        Err(ReceiveError::Malformed(e)) => {
            tracing::warn!("Malformed upload: {}", e);
            return Err((StatusCode::BAD_REQUEST, e.body_text()));
        }
        Err(ReceiveError::Internal(e)) => {
            tracing::error!("Failed to store upload: {:#}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)));
        }
    };

    match process_upload(&state, input).await {
        Ok(processed) => render_index(None, Some(&processed)),
        Err(e) => {
            tracing::error!("Video processing failed: {:#}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::OccupancyStats;
    use std::path::PathBuf;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn test_render_index_with_error() {
        let Html(page) = render_index(Some("No <file> part"), None).unwrap();
        assert!(page.contains(r#"<p class="error">No &lt;file&gt; part</p>"#));
        assert!(!page.contains("{{error}}"));
        assert!(!page.contains("{{result}}"));
        assert!(!page.contains("<video"));
    }

    #[test]
    fn test_render_index_with_result() {
        let processed = ProcessedVideo {
            output_path: PathBuf::from("/tmp/output_lot.mp4"),
            frames: 3,
            stats: OccupancyStats {
                total_slots: 3,
                available_slots: 1,
                occupied_slots: 2,
            },
        };
        let Html(page) = render_index(None, Some(&processed)).unwrap();
        assert!(page.contains(r#"<video controls src="/video/output_lot.mp4">"#));
        assert!(page.contains(r#"href="/download/output_lot.mp4""#));
        assert!(page.contains("<tr><th>Occupied slots</th><td>2</td></tr>"));
        assert!(!page.contains("class=\"error\""));
    }
}
