use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::browser::{run_in_session, BrowserEngine, BrowserPage, LoadState};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::Article;

/// Runs Readability against the loaded document and yields its `content` field.
const READABILITY_EVAL: &str = "(() => { const article = new Readability(document).parse(); return article ? article.content : ''; })()";

/// Loads one article in a headless browser and pulls out its readable html.
pub struct ContentExtractor {
    engine: Arc<dyn BrowserEngine>,
    base_url: String,
    script_url: String,
    navigation_timeout: Duration,
    extraction_timeout: Duration,
}

impl ContentExtractor {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: &Config) -> Self {
        Self {
            engine,
            base_url: config.index_url.clone(),
            script_url: config.readability_script_url(),
            navigation_timeout: config.navigation_timeout(),
            extraction_timeout: config.extraction_timeout(),
        }
    }

    /// Extracts `url` and stores the result on the matching row. The url must
    /// already be in the store; nothing is written when extraction fails or
    /// comes back empty.
    #[tracing::instrument(level = "info", skip(self, repository))]
    pub async fn extract_article(&self, repository: &Repository, url: &str) -> Result<Article> {
        let article = repository.get_article_by_url(url).await?;

        let html = self.extract(url).await?;

        let affected = repository.update_article_html(article.id, html).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "article {} disappeared during extraction",
                article.id
            )));
        }

        let article = repository.get_article_by_id(article.id).await?;
        tracing::info!(id = article.id, "Stored extracted article");
        Ok(article)
    }

    /// Browser half of the extraction: returns non-empty html, or
    /// `ExtractionEmpty` / `ExtractionTimeout`.
    pub async fn extract(&self, url: &str) -> Result<String> {
        let target = resolve_url(url, &self.base_url);

        let html = run_in_session(self.engine.as_ref(), move |page| async move {
            tokio::time::timeout(self.extraction_timeout, self.read_page(page, &target))
                .await
                .map_err(|_| AppError::ExtractionTimeout(url.to_string()))?
        })
        .await?;

        let html = html.trim();
        if html.is_empty() {
            tracing::warn!(%url, "Readability returned no content");
            return Err(AppError::ExtractionEmpty(url.to_string()));
        }

        tracing::debug!(%url, bytes = html.len(), "Extracted article content");
        Ok(html.to_string())
    }

    async fn read_page(&self, page: Box<dyn BrowserPage>, target: &str) -> Result<String> {
        tokio::time::timeout(self.navigation_timeout, page.goto(target))
            .await
            .map_err(|_| AppError::ExtractionTimeout(target.to_string()))??;
        page.wait_for_load(LoadState::DomContentLoaded).await?;
        page.inject_script(&self.script_url).await?;

        match page.evaluate(READABILITY_EVAL).await? {
            Value::String(html) => Ok(html),
            Value::Null => Ok(String::new()),
            other => Err(AppError::Browser(format!(
                "unexpected Readability result: {other}"
            ))),
        }
    }
}

/// Resolve a potentially relative URL against a base URL
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_string()
}
