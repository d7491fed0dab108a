use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, RwLock};

use crate::browser::BrowserEngine;
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::Article;
use crate::services::{ContentExtractor, LinkDiscovery};

/// What the store looked like when the process started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing stored yet; discovery populated it.
    Empty,
    /// Articles were already cached; discovery was skipped.
    Populated,
}

/// Process-wide coordinator shared by every request handler.
pub struct App {
    repository: Arc<Repository>,
    discovery: LinkDiscovery,
    extractor: Arc<ContentExtractor>,

    // Mirror of the store used to render the article list
    articles: RwLock<Vec<Article>>,

    // One gate per url with an extraction in progress
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl App {
    pub fn new(repository: Repository, engine: Arc<dyn BrowserEngine>, config: &Config) -> Self {
        Self {
            repository: Arc::new(repository),
            discovery: LinkDiscovery::new(Arc::clone(&engine), config),
            extractor: Arc::new(ContentExtractor::new(engine, config)),
            articles: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cold-start protocol: discover and insert candidates when the store is
    /// empty, then load the article list from the store. Meant to run once,
    /// before the server starts taking requests.
    pub async fn bootstrap(&self) -> Result<StoreState> {
        let count = self.repository.count_articles().await?;

        let state = if count == 0 {
            tracing::info!("Article store is empty, running discovery");
            let candidates = self.discovery.discover().await?;
            for candidate in candidates {
                self.repository.add_article(candidate).await?;
            }
            StoreState::Empty
        } else {
            tracing::info!(count, "Loading cached articles");
            StoreState::Populated
        };

        self.reload_articles().await?;
        Ok(state)
    }

    /// Runs discovery again and merges the results into the store. Articles
    /// that are already stored keep their id and extracted content.
    pub async fn rediscover(&self) -> Result<usize> {
        let candidates = self.discovery.discover().await?;
        let found = candidates.len();
        for candidate in candidates {
            self.repository.add_article(candidate).await?;
        }
        self.reload_articles().await?;
        Ok(found)
    }

    /// Snapshot of the current article list.
    pub async fn articles(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    /// Returns the article at `url` with its content, extracting it first when
    /// it has none yet or when `refresh` is set. Concurrent calls for the same
    /// url wait for the first one and then reuse its stored result.
    pub async fn fetch_article(&self, url: &str, refresh: bool) -> Result<Article> {
        let gate = GateRelease {
            app: self,
            url,
            gate: self.gate_for(url),
        };

        let outcome = {
            let _turn = gate.gate.lock().await;
            self.fetch_exclusive(url, refresh).await
        };
        drop(gate);

        match outcome {
            Ok(article) => {
                self.remember(&article).await;
                Ok(article)
            }
            Err(e) => {
                if e.is_persistence() {
                    tracing::error!(%url, "Failed to fetch article: {}", e);
                } else {
                    tracing::warn!(%url, "Failed to fetch article: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn fetch_exclusive(&self, url: &str, refresh: bool) -> Result<Article> {
        let cached = self.repository.get_article_by_url(url).await?;
        if cached.is_extracted() && !refresh {
            tracing::debug!(%url, id = cached.id, "Serving cached article");
            return Ok(cached);
        }

        // Run the browser work in its own task so a dropped request cannot
        // interrupt it before the session is closed.
        let repository = Arc::clone(&self.repository);
        let extractor = Arc::clone(&self.extractor);
        let url = url.to_string();
        tokio::spawn(async move { extractor.extract_article(&repository, &url).await })
            .await
            .map_err(|e| AppError::Browser(format!("extraction task failed: {e}")))?
    }

    fn gate_for(&self, url: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(url.to_string()).or_default())
    }

    fn release_gate(&self, url: &str, gate: &Arc<AsyncMutex<()>>) {
        let mut gates = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller still hold it: nobody else is waiting
        if Arc::strong_count(gate) <= 2 {
            gates.remove(url);
        }
    }

    async fn remember(&self, article: &Article) {
        let mut articles = self.articles.write().await;
        match articles.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => *existing = article.clone(),
            None => articles.push(article.clone()),
        }
    }

    async fn reload_articles(&self) -> Result<()> {
        let articles = self.repository.get_all_articles().await?;
        *self.articles.write().await = articles;
        Ok(())
    }
}

/// Gives a per-url gate back to the table when the request is done with it,
/// including when the request future is dropped mid-flight.
struct GateRelease<'a> {
    app: &'a App,
    url: &'a str,
    gate: Arc<AsyncMutex<()>>,
}

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        self.app.release_gate(self.url, &self.gate);
    }
}
