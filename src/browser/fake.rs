//! Scripted in-memory engine for exercising discovery and extraction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};

use super::{BrowserEngine, BrowserPage, BrowserSession, LoadState, PageElement};

/// A card on a fake index page.
#[derive(Debug, Clone)]
pub struct FakeCard {
    pub title: Option<String>,
    pub href: Option<String>,
}

impl FakeCard {
    pub fn new(title: &str, href: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            href: Some(href.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pub cards: Vec<FakeCard>,
    /// What the readability script returns for a page, keyed by absolute url.
    pub content: HashMap<String, String>,
    /// Artificial evaluation latency, keyed by absolute url.
    pub delays: HashMap<String, Duration>,
    /// Artificial navigation latency, keyed by absolute url.
    pub navigation_delays: HashMap<String, Duration>,
    pub unreachable: Vec<String>,
    pub fail_launch: bool,
    /// Sessions never finish closing.
    pub hang_on_close: bool,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    site: Arc<Mutex<FakeSite>>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    visited: Arc<Mutex<Vec<String>>>,
    injected: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(Mutex::new(site)),
            ..Default::default()
        }
    }

    pub fn set_content(&self, url: &str, html: &str) {
        self.site
            .lock()
            .unwrap()
            .content
            .insert(url.to_string(), html.to_string());
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if self.site.lock().unwrap().fail_launch {
            return Err(AppError::BrowserLaunch("no browser installed".to_string()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            engine: self.clone(),
        }))
    }
}

struct FakeSession {
    engine: FakeEngine,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(FakePage {
            engine: self.engine.clone(),
            current: Mutex::new(None),
            script_loaded: Mutex::new(false),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.engine.closes.fetch_add(1, Ordering::SeqCst);
        let hang = self.engine.site.lock().unwrap().hang_on_close;
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

struct FakePage {
    engine: FakeEngine,
    current: Mutex<Option<String>>,
    script_loaded: Mutex<bool>,
}

impl FakePage {
    fn current_url(&self) -> Result<String> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Browser("page has not been navigated".to_string()))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.engine.visited.lock().unwrap().push(url.to_string());
        let (delay, unreachable) = {
            let site = self.engine.site.lock().unwrap();
            (
                site.navigation_delays.get(url).copied(),
                site.unreachable.iter().any(|u| u == url),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            return Err(AppError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self, _state: LoadState) -> Result<()> {
        self.current_url().map(|_| ())
    }

    async fn inject_script(&self, url: &str) -> Result<()> {
        self.engine.injected.lock().unwrap().push(url.to_string());
        *self.script_loaded.lock().unwrap() = true;
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value> {
        let url = self.current_url()?;
        if !*self.script_loaded.lock().unwrap() {
            return Err(AppError::Browser("Readability is not defined".to_string()));
        }
        let (delay, content) = {
            let site = self.engine.site.lock().unwrap();
            (site.delays.get(&url).copied(), site.content.get(&url).cloned())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(content.map(Value::String).unwrap_or(Value::Null))
    }

    async fn query_all(&self, _selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        self.current_url()?;
        let cards = self.engine.site.lock().unwrap().cards.clone();
        Ok(cards
            .into_iter()
            .map(|card| Box::new(FakeElement::Card(card)) as Box<dyn PageElement>)
            .collect())
    }
}

enum FakeElement {
    Card(FakeCard),
    Title(String),
}

#[async_trait]
impl PageElement for FakeElement {
    async fn text(&self) -> Result<String> {
        match self {
            FakeElement::Card(card) => Ok(card.title.clone().unwrap_or_default()),
            FakeElement::Title(title) => Ok(title.clone()),
        }
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self {
            FakeElement::Card(card) if name == "href" => Ok(card.href.clone()),
            _ => Ok(None),
        }
    }

    async fn query_first(&self, _selector: &str) -> Result<Option<Box<dyn PageElement>>> {
        match self {
            FakeElement::Card(FakeCard {
                title: Some(title), ..
            }) => Ok(Some(Box::new(FakeElement::Title(title.clone())))),
            _ => Ok(None),
        }
    }
}
