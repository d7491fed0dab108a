use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

// Readability.js and htmx.min.js are dropped into public/assets/js before building
#[derive(RustEmbed)]
#[folder = "public/"]
pub struct PublicAssets;

/// Serve a file from the embedded `public/` folder verbatim.
pub async fn serve_public(Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    match PublicAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
