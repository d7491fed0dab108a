//! Narrow contract over a headless browser engine.
//!
//! Discovery and extraction only sequence these calls; they never look at
//! the engine itself, so tests drive them with a scripted fake.

mod chromium;
#[cfg(test)]
pub mod fake;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use chromium::ChromiumEngine;

// Last-resort bound on teardown; engines are expected to finish well before it
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Document lifecycle milestones a page can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Starts a fresh browser instance.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Shuts the browser down. Must be called once on every exit path.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn wait_for_load(&self, state: LoadState) -> Result<()>;

    /// Appends a `<script src=..>` tag and resolves once it has loaded.
    async fn inject_script(&self, url: &str) -> Result<()>;

    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
}

#[async_trait]
pub trait PageElement: Send + Sync {
    async fn text(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn query_first(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>>;
}

/// Launches a session, hands a fresh page to `work` and closes the session
/// again whatever `work` returned. A close that does not finish in time is
/// abandoned so the caller always gets its outcome back.
pub async fn run_in_session<T, F, Fut>(engine: &dyn BrowserEngine, work: F) -> Result<T>
where
    F: FnOnce(Box<dyn BrowserPage>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = engine.launch().await?;

    let outcome = match session.new_page().await {
        Ok(page) => work(page).await,
        Err(e) => Err(e),
    };

    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Failed to close browser session: {}", e),
        Err(_) => tracing::warn!(
            "Browser session did not close within {:?}, abandoning it",
            SESSION_CLOSE_TIMEOUT
        ),
    }

    outcome
}
