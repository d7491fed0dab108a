//! HTTP surface: full page, list fragment, article fragment and static files.

mod assets;
mod views;

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::error::AppError;
use views::{ArticleListTemplate, ArticleTemplate, PageTemplate};

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/get-articles", get(article_list))
        .route("/get-article", get(article))
        .route("/public/*path", get(assets::serve_public))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn index(State(app): State<Arc<App>>) -> Result<Html<String>, AppError> {
    let articles = app.articles().await;
    Ok(Html(PageTemplate::new(&articles).render()?))
}

async fn article_list(State(app): State<Arc<App>>) -> Result<Html<String>, AppError> {
    let articles = app.articles().await;
    Ok(Html(ArticleListTemplate::new(&articles).render()?))
}

#[derive(Debug, Deserialize)]
struct ArticleQuery {
    url: String,
    #[serde(default)]
    refresh: bool,
}

async fn article(
    State(app): State<Arc<App>>,
    Query(query): Query<ArticleQuery>,
) -> Result<Response, AppError> {
    if query.url.trim().is_empty() {
        let body = Html(r#"<p class="error">Missing url</p>"#);
        return Ok((StatusCode::BAD_REQUEST, body).into_response());
    }
    let article = app.fetch_article(&query.url, query.refresh).await?;
    Ok(Html(ArticleTemplate::from(&article).render()?).into_response())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExtractionEmpty(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExtractionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::BrowserLaunch(_)
            | AppError::Navigation { .. }
            | AppError::Browser(_)
            | AppError::Discovery(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(%status, "Request failed: {}", self);
        }

        let body = format!(
            r#"<p class="error">{}</p>"#,
            status.canonical_reason().unwrap_or("Error")
        );
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeCard, FakeEngine, FakeSite};
    use crate::config::Config;
    use crate::db::Repository;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app(engine: &FakeEngine) -> (TempDir, Arc<App>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.db");
        let repository = Repository::new(path.to_str().unwrap()).await.unwrap();
        let config = Config {
            index_url: "https://news.example/".to_string(),
            ..Config::default()
        };
        let app = App::new(repository, Arc::new(engine.clone()), &config);
        app.bootstrap().await.unwrap();
        (dir, Arc::new(app))
    }

    fn site() -> FakeSite {
        FakeSite {
            cards: vec![
                FakeCard::new("Morning Briefing", "/a/1"),
                FakeCard::new("Weather Update", "/a/2"),
            ],
            ..Default::default()
        }
    }

    async fn get(app: Arc<App>, uri: &str) -> (StatusCode, String) {
        let response = router(app)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_lists_discovered_articles() {
        let engine = FakeEngine::new(site());
        let (_dir, app) = test_app(&engine).await;

        let (status, body) = get(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Morning Briefing"));
        assert!(body.contains("/get-article?url=%2Fa%2F2"));
    }

    #[tokio::test]
    async fn article_route_renders_extracted_content() {
        let engine = FakeEngine::new(site());
        engine.set_content("https://news.example/a/1", "<p>Content</p>");
        let (_dir, app) = test_app(&engine).await;

        let (status, body) = get(Arc::clone(&app), "/get-article?url=%2Fa%2F1").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<p>Content</p>"));
        let (_, list) = get(app, "/get-articles").await;
        assert!(list.contains(r#"class="extracted""#));
    }

    #[tokio::test]
    async fn extraction_failures_map_to_error_responses() {
        let engine = FakeEngine::new(site());
        let (_dir, app) = test_app(&engine).await;

        let (empty, _) = get(Arc::clone(&app), "/get-article?url=%2Fa%2F1").await;
        let (unknown, _) = get(Arc::clone(&app), "/get-article?url=%2Fnope").await;
        let (missing, _) = get(Arc::clone(&app), "/get-article").await;
        let (blank, _) = get(app, "/get-article?url=").await;

        assert_eq!(empty, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unknown, StatusCode::NOT_FOUND);
        assert_eq!(missing, StatusCode::BAD_REQUEST);
        assert_eq!(blank, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found() {
        let engine = FakeEngine::new(site());
        let (_dir, app) = test_app(&engine).await;

        let (status, _) = get(Arc::clone(&app), "/public/missing.js").await;
        let (css, body) = get(app, "/public/css/app.css").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(css, StatusCode::OK);
        assert!(body.contains(".article-list"));
    }
}
