use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, NewArticle};

use super::schema;

const ARTICLE_COLUMNS: &str = "id, title, url, html, discovered_at, extracted_at";

/// Persistent article cache. All calls go through a single connection thread,
/// which serializes writes.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            schema::apply(conn)?;
            Ok(())
        })
        .await?;

        tracing::debug!(db_path, "Article store opened");
        Ok(Self { conn })
    }

    /// Inserts an article and returns its id. A url that is already stored is
    /// updated in place (title refreshed, existing html kept unless new html is
    /// supplied) and keeps its original id.
    pub async fn add_article(&self, article: NewArticle) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let id = conn.query_row(
                    r#"INSERT INTO article (html, url, title, extracted_at)
                       VALUES (?1, ?2, ?3, CASE WHEN ?1 IS NULL THEN NULL ELSE datetime('now') END)
                       ON CONFLICT(url) DO UPDATE SET
                           title = excluded.title,
                           html = COALESCE(excluded.html, article.html),
                           extracted_at = CASE
                               WHEN excluded.html IS NULL THEN article.extracted_at
                               ELSE datetime('now')
                           END
                       RETURNING id"#,
                    params![article.html, article.url, article.title],
                    |row| row.get::<_, i64>(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    /// Overwrites the html of an existing row. Returns the number of rows
    /// touched; 0 means no article has this id.
    pub async fn update_article_html(&self, id: i64, html: String) -> Result<usize> {
        let affected = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(
                    "UPDATE article SET html = ?2, extracted_at = datetime('now') WHERE id = ?1",
                    params![id, html],
                )?;
                Ok(affected)
            })
            .await?;
        Ok(affected)
    }

    pub async fn get_article_by_id(&self, id: i64) -> Result<Article> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM article WHERE id = ?1"),
                        params![id],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        article.ok_or_else(|| AppError::NotFound(format!("article with id {id}")))
    }

    pub async fn get_article_by_url(&self, url: &str) -> Result<Article> {
        let lookup = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM article WHERE url = ?1"),
                        params![lookup],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        article.ok_or_else(|| AppError::NotFound(format!("article with url {url}")))
    }

    pub async fn count_articles(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM article", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    /// All articles in insertion order.
    pub async fn get_all_articles(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ARTICLE_COLUMNS} FROM article ORDER BY id"))?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn delete_article(&self, id: i64) -> Result<usize> {
        let affected = self
            .conn
            .call(move |conn| {
                let affected = conn.execute("DELETE FROM article WHERE id = ?1", params![id])?;
                Ok(affected)
            })
            .await?;
        Ok(affected)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        html: row.get(3)?,
        discovered_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        extracted_at: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s)),
    })
}
