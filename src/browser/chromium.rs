use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};

use super::{BrowserEngine, BrowserPage, BrowserSession, LoadState, PageElement};

// Upper bound for each teardown step before the process is killed
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches a new headless Chromium process per session. There is no pooling:
/// every session pays the full startup cost.
pub struct ChromiumEngine {
    headless: bool,
    request_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new(headless: bool, request_timeout: Duration) -> Self {
        Self {
            headless,
            request_timeout,
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder().request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AppError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserLaunch(e.to_string()))?;

        // The CDP handler has to be polled for the browser to make progress.
        // Some events fail to deserialize on newer Chrome builds; those are
        // not fatal, so keep polling until the stream ends.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {}", e);
                }
            }
            tracing::debug!("Browser handler finished");
        });

        tracing::debug!("Browser launched");
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::Browser(format!("could not create page: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            handler_task,
        } = *self;

        let closed = match tokio::time::timeout(CLOSE_TIMEOUT, browser.close()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::Browser(format!("could not close browser: {e}"))),
            Err(_) => Err(AppError::Browser(format!(
                "browser did not close within {CLOSE_TIMEOUT:?}"
            ))),
        };

        if closed.is_err() {
            tracing::warn!("Killing browser process after failed close");
            if let Some(Err(e)) = browser.kill().await {
                tracing::warn!("Failed to kill browser process: {}", e);
            }
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("Failed to reap browser process: {}", e),
            Err(_) => tracing::warn!("Browser process still running after {:?}", CLOSE_TIMEOUT),
        }
        handler_task.abort();

        closed.map(|_| tracing::debug!("Browser closed"))
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_load(&self, state: LoadState) -> Result<()> {
        let script = match state {
            LoadState::DomContentLoaded => {
                "new Promise(resolve => { if (document.readyState !== 'loading') { resolve(true); } else { document.addEventListener('DOMContentLoaded', () => resolve(true), { once: true }); } })"
            }
        };
        self.evaluate(script).await?;
        Ok(())
    }

    async fn inject_script(&self, url: &str) -> Result<()> {
        let src = serde_json::to_string(url)?;
        let script = format!(
            "new Promise((resolve, reject) => {{ const s = document.createElement('script'); s.src = {src}; s.onload = () => resolve(true); s.onerror = () => reject(new Error('could not load ' + {src})); (document.head || document.documentElement).appendChild(s); }})"
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| AppError::Browser(format!("could not inject script {url}: {e}")))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| AppError::Browser(format!("script evaluation failed: {e}")))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| AppError::Browser(format!("query {selector} failed: {e}")))?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn PageElement>)
            .collect())
    }
}

struct ChromiumElement {
    element: Element,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn text(&self) -> Result<String> {
        let text = self
            .element
            .inner_text()
            .await
            .map_err(|e| AppError::Browser(format!("could not read text: {e}")))?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| AppError::Browser(format!("could not read attribute {name}: {e}")))
    }

    async fn query_first(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>> {
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(|e| AppError::Browser(format!("query {selector} failed: {e}")))?;
        Ok(elements
            .into_iter()
            .next()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn PageElement>))
    }
}
