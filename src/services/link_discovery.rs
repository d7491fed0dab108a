use std::sync::Arc;
use std::time::Duration;

use crate::browser::{run_in_session, BrowserEngine, BrowserPage};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::NewArticle;

/// Lists article candidates from the index page of the source site.
pub struct LinkDiscovery {
    engine: Arc<dyn BrowserEngine>,
    index_url: String,
    card_selector: String,
    title_selector: String,
    navigation_timeout: Duration,
}

impl LinkDiscovery {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: &Config) -> Self {
        Self {
            engine,
            index_url: config.index_url.clone(),
            card_selector: config.card_selector.clone(),
            title_selector: config.title_selector.clone(),
            navigation_timeout: config.navigation_timeout(),
        }
    }

    /// Returns one candidate per card, in document order, with no html.
    /// Any browser failure is reported as [`AppError::Discovery`].
    #[tracing::instrument(level = "info", skip(self), fields(index = %self.index_url))]
    pub async fn discover(&self) -> Result<Vec<NewArticle>> {
        let candidates = run_in_session(self.engine.as_ref(), |page| self.collect_cards(page))
            .await
            .map_err(|e| match e {
                AppError::Discovery(_) => e,
                other => AppError::Discovery(other.to_string()),
            })?;

        tracing::info!(count = candidates.len(), "Discovered article links");
        Ok(candidates)
    }

    async fn collect_cards(&self, page: Box<dyn BrowserPage>) -> Result<Vec<NewArticle>> {
        tokio::time::timeout(self.navigation_timeout, page.goto(&self.index_url))
            .await
            .map_err(|_| {
                AppError::Discovery(format!(
                    "navigation to {} timed out after {:?}",
                    self.index_url, self.navigation_timeout
                ))
            })??;

        let cards = page.query_all(&self.card_selector).await?;
        let mut candidates = Vec::with_capacity(cards.len());

        for (position, card) in cards.into_iter().enumerate() {
            let href = match card.attribute("href").await? {
                Some(href) if !href.trim().is_empty() => href.trim().to_string(),
                _ => {
                    tracing::warn!(position, "Skipping card without a link");
                    continue;
                }
            };

            let title = match card.query_first(&self.title_selector).await? {
                Some(title) => title.text().await?.trim().to_string(),
                None => String::new(),
            };
            let title = if title.is_empty() {
                "Untitled".to_string()
            } else {
                title
            };

            candidates.push(NewArticle::new(title, href));
        }

        Ok(candidates)
    }
}
