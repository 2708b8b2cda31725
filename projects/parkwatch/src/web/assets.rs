use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
pub struct Assets;

pub async fn static_handler(path: axum::extract::Path<String>) -> impl IntoResponse {
    let path = path.trim_start_matches('/');

    match serve_asset(path) {
        Ok(response) => response.into_response(),
        Err(status) => (status, "404 Not Found").into_response(),
    }
}

/// Page template as UTF-8 text
pub fn template(name: &str) -> Option<String> {
    let asset = Assets::get(name)?;
    String::from_utf8(asset.data.into_owned()).ok()
}

fn serve_asset(path: &str) -> Result<Response<Body>, StatusCode> {
    if let Some(asset) = Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let content_type =
            HeaderValue::from_str(mime.as_ref()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Response::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(asset.data.into_owned()))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_template_is_embedded() {
        let html = template("index.html").unwrap();
        assert!(html.contains("{{error}}"));
        assert!(html.contains("{{result}}"));
        assert!(html.contains("name=\"video\""));
    }

    #[test]
    fn test_serve_asset() {
        let response = serve_asset("style.css").unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
        assert_eq!(serve_asset("missing.js").err(), Some(StatusCode::NOT_FOUND));
    }
}
