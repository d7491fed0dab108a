use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not launch browser: {0}")]
    BrowserLaunch(String),

    #[error("could not navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("article discovery failed: {0}")]
    Discovery(String),

    #[error("no readable content extracted from {0}")]
    ExtractionEmpty(String),

    #[error("extraction of {0} timed out")]
    ExtractionTimeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Errors raised while talking to the store rather than to the browser.
    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
