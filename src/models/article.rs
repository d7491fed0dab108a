use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article candidate that has not been written to the store yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub html: Option<String>,
}

impl NewArticle {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            html: None,
        }
    }
}

/// A row of the article store. `id` is assigned on insert and never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub html: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub extracted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_extracted(&self) -> bool {
        self.html.as_deref().is_some_and(|html| !html.is_empty())
    }
}
