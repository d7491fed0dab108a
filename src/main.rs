use std::sync::Arc;

use anyhow::Context;

mod app;
mod browser;
mod config;
mod db;
mod error;
mod models;
mod services;
mod web;

use app::{App, StoreState};
use browser::ChromiumEngine;
use config::Config;
use db::Repository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (info by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chromiumoxide=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Check for --discover flag (re-run discovery and exit)
    let rediscover = args.len() >= 2 && args[1] == "--discover";

    let config = Config::load().context("Failed to load configuration")?;

    let repository = Repository::new(&config.db_path)
        .await
        .with_context(|| format!("Could not open article store at {}", config.db_path))?;
    tracing::info!(db_path = %config.db_path, "Db init successful");

    let engine = Arc::new(ChromiumEngine::new(config.headless, config.navigation_timeout()));
    let app = Arc::new(App::new(repository, engine, &config));

    if rediscover {
        let found = app.rediscover().await.context("Discovery failed")?;
        println!("Discovered {} articles", found);
        return Ok(());
    }

    match app.bootstrap().await {
        Ok(StoreState::Empty) => {
            tracing::info!(count = app.articles().await.len(), "Store populated by discovery")
        }
        Ok(StoreState::Populated) => {
            tracing::info!(count = app.articles().await.len(), "Loaded articles from store")
        }
        Err(e) if e.is_persistence() => {
            return Err(e).context("Could not read the article store");
        }
        Err(e) => {
            tracing::error!("Starting with an empty article list: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, web::router(app))
        .await
        .context("Server error")?;

    Ok(())
}
