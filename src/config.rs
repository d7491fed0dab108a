use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DB_PATH_VAR: &str = "SQLITE_DB_PATH";

/// Route under which the server exposes Readability.js.
pub const READABILITY_SCRIPT_PATH: &str = "/public/assets/js/Readability.js";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Always taken from `SQLITE_DB_PATH`, never written to the config file.
    #[serde(skip)]
    pub db_path: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_index_url")]
    pub index_url: String,

    #[serde(default = "default_card_selector")]
    pub card_selector: String,

    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    /// Where the browser loads Readability.js from. Unset means this
    /// process's own `/public` route on `bind_addr`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readability_script_url: Option<String>,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3333".to_string()
}

fn default_index_url() -> String {
    "https://sporza.be/nl/pas-verschenen/".to_string()
}

fn default_card_selector() -> String {
    ".sw-card-module-card".to_string()
}

fn default_title_selector() -> String {
    ".sw-title-module-title".to_string()
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_extraction_timeout() -> u64 {
    90
}

fn default_headless() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            bind_addr: default_bind_addr(),
            index_url: default_index_url(),
            card_selector: default_card_selector(),
            title_selector: default_title_selector(),
            readability_script_url: None,
            navigation_timeout_secs: default_navigation_timeout(),
            extraction_timeout_secs: default_extraction_timeout(),
            headless: default_headless(),
        }
    }
}

impl Config {
    /// Reads the config file (writing a default one on first run) and the
    /// required database location from the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            if let Err(e) = config.save() {
                tracing::warn!("Could not write default config to {:?}: {}", config_path, e);
            }
            config
        };

        config.db_path = db_path_from(std::env::var(DB_PATH_VAR).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("article-cache")
            .join("config.toml")
    }

    /// The configured script url, or the script route on the address the
    /// server listens on. Wildcard binds are reached through loopback.
    pub fn readability_script_url(&self) -> String {
        if let Some(url) = &self.readability_script_url {
            return url.clone();
        }

        let host = match self.bind_addr.parse::<SocketAddr>() {
            Ok(mut addr) => {
                if addr.ip().is_unspecified() {
                    let loopback = if addr.is_ipv4() {
                        Ipv4Addr::LOCALHOST.into()
                    } else {
                        Ipv6Addr::LOCALHOST.into()
                    };
                    addr.set_ip(loopback);
                }
                addr.to_string()
            }
            Err(_) => self.bind_addr.clone(),
        };
        format!("http://{host}{READABILITY_SCRIPT_PATH}")
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

fn db_path_from(value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(path) if !path.is_empty() => Ok(path),
        _ => Err(AppError::Config(format!(
            "please specify the {DB_PATH_VAR} env var"
        ))),
    }
}
